//! Rule definition persistence.
//!
//! [`RuleDefinitionStore`] is the collaborator boundary the engine loads
//! active rules through. Two implementations ship with the crate:
//! [`InMemoryRuleStore`] and the YAML-directory backed [`FsRuleStore`].

mod error;
mod directory;
mod memory;

#[cfg(test)]
mod tests;

pub use self::error::{LoadResult, LoadStatus, Result, StoreError};
pub use self::directory::FsRuleStore;
pub use self::memory::InMemoryRuleStore;

use async_trait::async_trait;

use crate::schema::RuleDefinition;

/// Persists rule definitions and exposes the currently active set.
#[async_trait]
pub trait RuleDefinitionStore: Send + Sync {
    /// All active definitions, ordered by id.
    async fn active_definitions(&self) -> Result<Vec<RuleDefinition>>;

    async fn get(&self, id: &str) -> Result<Option<RuleDefinition>>;

    /// Insert a definition whose id is not taken yet, checked and written as
    /// one step. Fails with [`StoreError::AlreadyExists`] otherwise, even
    /// when the existing record is inactive.
    async fn create(&self, definition: RuleDefinition) -> Result<RuleDefinition>;

    /// Insert or replace a definition. An existing record keeps its
    /// `created_at`; `updated_at` is set to the time of the write.
    async fn upsert(&self, definition: RuleDefinition) -> Result<RuleDefinition>;

    /// Mark a definition inactive. Fails with [`StoreError::NotFound`] for unknown ids.
    async fn deactivate(&self, id: &str) -> Result<RuleDefinition>;

    /// Put `id` back exactly as `previous` (timestamps included), or delete
    /// it when `previous` is `None`. Used to undo a change that could not be
    /// audited.
    async fn restore(&self, id: &str, previous: Option<RuleDefinition>) -> Result<()>;
}

/// Rule ids double as file names, so restrict them to a safe alphabet.
pub(crate) fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("invalid rule id '{}'", id)))
    }
}
