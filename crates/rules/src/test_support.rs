//! Collaborator doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use custos_audit::{AuditEntry, AuditError, AuditStore, DateRange, InMemoryAuditStore};
use custos_core::{Alert, AlertStatus};

use crate::alerts::{AlertStore, InMemoryAlertStore};
use crate::store::StoreError;

/// Audit store whose inserts can be switched to fail.
#[derive(Default, Clone)]
pub(crate) struct FlakyAuditStore {
    pub inner: InMemoryAuditStore,
    failing: Arc<AtomicBool>,
}

impl FlakyAuditStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditStore for FlakyAuditStore {
    async fn last_sequence(&self) -> custos_audit::Result<u64> {
        self.inner.last_sequence().await
    }

    async fn insert(&self, entry: AuditEntry) -> custos_audit::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Store("audit backend unavailable".to_string()));
        }
        self.inner.insert(entry).await
    }

    async fn get(&self, id: u64) -> custos_audit::Result<Option<AuditEntry>> {
        self.inner.get(id).await
    }

    async fn list(&self, range: &DateRange) -> custos_audit::Result<Vec<AuditEntry>> {
        self.inner.list(range).await
    }
}

/// Alert store that yields to the scheduler after every read, so concurrent
/// callers interleave between reading an alert and writing it back.
#[derive(Default, Clone)]
pub(crate) struct YieldingAlertStore {
    pub inner: InMemoryAlertStore,
}

#[async_trait]
impl AlertStore for YieldingAlertStore {
    async fn insert(&self, alert: Alert) -> Result<(), StoreError> {
        self.inner.insert(alert).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        let alert = self.inner.get(id).await;
        tokio::task::yield_now().await;
        alert
    }

    async fn update(&self, alert: &Alert, expected: AlertStatus) -> Result<bool, StoreError> {
        self.inner.update(alert, expected).await
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.remove(id).await
    }

    async fn find_open(&self, rule_id: &str, evidence_id: &str) -> Result<Option<Alert>, StoreError> {
        self.inner.find_open(rule_id, evidence_id).await
    }

    async fn list_for_case(&self, case_id: &str) -> Result<Vec<Alert>, StoreError> {
        self.inner.list_for_case(case_id).await
    }
}
