//! Alert persistence collaborator.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use custos_core::{Alert, AlertStatus};

use crate::store::StoreError;

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist a new alert. Fails if the id is already taken.
    async fn insert(&self, alert: Alert) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError>;

    /// Replace a stored alert only while its stored status is still
    /// `expected`, checked and written as one step.
    ///
    /// Returns `Ok(false)` when the status has moved on. Fails with
    /// [`StoreError::NotFound`] for unknown ids.
    async fn update(&self, alert: &Alert, expected: AlertStatus) -> Result<bool, StoreError>;

    /// Drop an alert whose creation could not be recorded. Returns whether it existed.
    async fn remove(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Open (pending or acknowledged) alert raised by `rule_id` for `evidence_id`.
    async fn find_open(&self, rule_id: &str, evidence_id: &str) -> Result<Option<Alert>, StoreError>;

    /// Alerts of a case in creation order.
    async fn list_for_case(&self, case_id: &str) -> Result<Vec<Alert>, StoreError>;
}

/// In-memory alert store.
#[derive(Default, Clone)]
pub struct InMemoryAlertStore {
    alerts: Arc<RwLock<Vec<Alert>>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().expect("alert store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts.read().expect("alert store lock poisoned").clone()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn insert(&self, alert: Alert) -> Result<(), StoreError> {
        let mut guard = self.alerts.write().expect("alert store lock poisoned");
        if guard.iter().any(|a| a.id == alert.id) {
            return Err(StoreError::Validation(format!("alert {} already exists", alert.id)));
        }
        guard.push(alert);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        let guard = self.alerts.read().expect("alert store lock poisoned");
        Ok(guard.iter().find(|a| a.id == id).cloned())
    }

    async fn update(&self, alert: &Alert, expected: AlertStatus) -> Result<bool, StoreError> {
        let mut guard = self.alerts.write().expect("alert store lock poisoned");
        let slot = guard
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| StoreError::NotFound(alert.id.to_string()))?;
        if slot.status != expected {
            return Ok(false);
        }
        *slot = alert.clone();
        Ok(true)
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.alerts.write().expect("alert store lock poisoned");
        let before = guard.len();
        guard.retain(|a| a.id != id);
        Ok(guard.len() != before)
    }

    async fn find_open(&self, rule_id: &str, evidence_id: &str) -> Result<Option<Alert>, StoreError> {
        let guard = self.alerts.read().expect("alert store lock poisoned");
        Ok(guard
            .iter()
            .find(|a| a.status.is_open() && a.rule_id == rule_id && a.source_evidence_id == evidence_id)
            .cloned())
    }

    async fn list_for_case(&self, case_id: &str) -> Result<Vec<Alert>, StoreError> {
        let guard = self.alerts.read().expect("alert store lock poisoned");
        Ok(guard.iter().filter(|a| a.case_id == case_id).cloned().collect())
    }
}
