//! Persistence collaborator for audit entries.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::entry::{AuditEntry, DateRange};
use crate::error::{AuditError, Result};

/// Append-only persistence for audit entries.
///
/// Deliberately exposes no update or delete operation.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Highest sequence number stored so far, or 0 when empty.
    async fn last_sequence(&self) -> Result<u64>;

    /// Persist a new entry. Must fail if the sequence number is already taken.
    async fn insert(&self, entry: AuditEntry) -> Result<()>;

    async fn get(&self, id: u64) -> Result<Option<AuditEntry>>;

    /// Entries whose timestamp falls in `range`, ordered by sequence number.
    async fn list(&self, range: &DateRange) -> Result<Vec<AuditEntry>>;
}

/// In-memory audit store keyed by sequence number.
#[derive(Default, Clone)]
pub struct InMemoryAuditStore {
    entries: Arc<RwLock<BTreeMap<u64, AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a stored entry in place, bypassing the append-only API.
    /// Only tests use this, to simulate tampering at the storage layer.
    #[cfg(test)]
    pub(crate) fn tamper(&self, id: u64, f: impl FnOnce(&mut AuditEntry)) {
        let mut guard = self.entries.write().expect("audit store lock poisoned");
        if let Some(entry) = guard.get_mut(&id) {
            f(entry);
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn last_sequence(&self) -> Result<u64> {
        let guard = self.entries.read().expect("audit store lock poisoned");
        Ok(guard.keys().next_back().copied().unwrap_or(0))
    }

    async fn insert(&self, entry: AuditEntry) -> Result<()> {
        let mut guard = self.entries.write().expect("audit store lock poisoned");
        if guard.contains_key(&entry.id) {
            return Err(AuditError::DuplicateSequence(entry.id));
        }
        guard.insert(entry.id, entry);
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<Option<AuditEntry>> {
        let guard = self.entries.read().expect("audit store lock poisoned");
        Ok(guard.get(&id).cloned())
    }

    async fn list(&self, range: &DateRange) -> Result<Vec<AuditEntry>> {
        let guard = self.entries.read().expect("audit store lock poisoned");
        Ok(guard
            .values()
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect())
    }
}
