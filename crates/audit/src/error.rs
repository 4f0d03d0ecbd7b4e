//! Error types for the audit subsystem.

/// Errors raised by the audit logger and its store.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Recomputed signature does not match the stored one.
    #[error("audit entry {id} failed integrity verification")]
    Integrity { id: u64 },

    #[error("audit entry {0} not found")]
    NotFound(u64),

    /// A second entry tried to claim an existing sequence number.
    #[error("audit sequence number {0} is already taken")]
    DuplicateSequence(u64),

    /// Persistence collaborator failure.
    #[error("audit store error: {0}")]
    Store(String),
}

/// Result alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
