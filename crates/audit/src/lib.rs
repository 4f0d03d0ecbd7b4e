//! Tamper-evident, append-only audit log.
//!
//! This crate provides:
//! - [`AuditEntry`] records signed with a SHA-256 digest over a canonical serialization
//! - [`AuditLogger`] for appending, verifying, and exporting entries
//! - [`AuditStore`] collaborator trait with an in-memory implementation
//!
//! Entries are write-once: there is no update or delete operation anywhere in
//! the API. Verification re-derives the digest from the persisted fields and
//! reports a mismatch instead of repairing it.

pub mod canonical;
pub mod entry;
pub mod error;
pub mod logger;
pub mod store;

pub use entry::{AuditEntry, AuditRecord, ClientMetadata, DateRange, ExportedAuditEntry};
pub use error::{AuditError, Result};
pub use logger::{AuditLogger, VerificationReport};
pub use store::{AuditStore, InMemoryAuditStore};
