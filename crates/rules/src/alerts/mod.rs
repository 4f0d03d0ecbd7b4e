//! Alert service: creation and lifecycle transitions, each recorded in the
//! audit log.
//!
//! ```text
//! pending -(acknowledge)-> acknowledged -(resolve)-> resolved
//! pending -(dismiss)-> dismissed
//! ```

mod store;

pub use store::{AlertStore, InMemoryAlertStore};

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use custos_audit::{AuditError, AuditLogger, AuditRecord};
use custos_core::{Alert, AlertTransition, CoreError};

use crate::actions::AlertRequest;
use crate::store::StoreError;

/// Audit target type for alert entries.
pub const ALERT_TARGET: &str = "alert";

#[derive(Debug, thiserror::Error)]
pub enum AlertServiceError {
    #[error("alert {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] CoreError),

    #[error("alert store error: {0}")]
    Store(#[from] StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),
}

pub type Result<T> = std::result::Result<T, AlertServiceError>;

/// Creates alerts and moves them through their lifecycle.
///
/// A change is only kept once its audit entry is written: when the append
/// fails the stored alert is put back the way it was and the audit error is
/// returned. Status writes are conditional on the status that was read, so a
/// transition racing another writer on the same store is rejected.
pub struct AlertService {
    store: Arc<dyn AlertStore>,
    audit: Arc<AuditLogger>,
    dedup: bool,
    /// Serializes the read, write, audit, rollback sequence of this service.
    writes: Mutex<()>,
}

impl AlertService {
    pub fn new(store: Arc<dyn AlertStore>, audit: Arc<AuditLogger>) -> Self {
        Self {
            store,
            audit,
            dedup: false,
            writes: Mutex::new(()),
        }
    }

    /// Suppress a new alert while an open alert from the same rule for the
    /// same evidence item exists.
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Persist a new pending alert and audit `alert.created`.
    ///
    /// Returns `None` when dedup is on and an open alert for the same rule
    /// and evidence item already exists.
    pub async fn create(&self, request: &AlertRequest) -> Result<Option<Alert>> {
        let _writes = self.writes.lock().await;

        if self.dedup {
            let open = self
                .store
                .find_open(&request.rule_id, &request.source_evidence_id)
                .await?;
            if let Some(existing) = open {
                debug!(
                    rule_id = %request.rule_id,
                    evidence_id = %request.source_evidence_id,
                    existing = %existing.id,
                    "open alert already exists, suppressed duplicate"
                );
                return Ok(None);
            }
        }

        let alert = Alert::new(
            request.case_id.clone(),
            request.rule_id.clone(),
            request.source_evidence_id.clone(),
            request.severity,
            request.message.clone(),
            request.evidence_refs.clone(),
            Utc::now(),
        );
        self.store.insert(alert.clone()).await?;

        let recorded = self
            .audit
            .append(
                AuditRecord::new("alert.created", ALERT_TARGET)
                    .target(alert.id.to_string())
                    .details(json!({
                        "case_id": alert.case_id,
                        "rule_id": alert.rule_id,
                        "evidence_id": alert.source_evidence_id,
                        "severity": alert.severity,
                        "evidence_refs": alert.evidence_refs,
                    })),
            )
            .await;
        if let Err(e) = recorded {
            match self.store.remove(alert.id).await {
                Ok(_) => warn!(alert_id = %alert.id, error = %e, "audit append failed, alert discarded"),
                Err(rollback) => error!(
                    alert_id = %alert.id,
                    error = %e,
                    rollback_error = %rollback,
                    "audit append failed and the alert could not be discarded"
                ),
            }
            return Err(e.into());
        }

        info!(
            alert_id = %alert.id,
            rule_id = %alert.rule_id,
            case_id = %alert.case_id,
            severity = %alert.severity,
            "alert created"
        );
        Ok(Some(alert))
    }

    /// `pending -> acknowledged`.
    pub async fn acknowledge(&self, id: Uuid, user_id: &str) -> Result<Alert> {
        self.transition(id, AlertTransition::Acknowledge, user_id, |alert| {
            alert.acknowledge(user_id, Utc::now())
        })
        .await
    }

    /// `acknowledged -> resolved`.
    pub async fn resolve(&self, id: Uuid, user_id: &str, notes: &str) -> Result<Alert> {
        self.transition(id, AlertTransition::Resolve, user_id, |alert| {
            alert.resolve(notes, Utc::now())
        })
        .await
    }

    /// `pending -> dismissed`.
    pub async fn dismiss(&self, id: Uuid, user_id: &str) -> Result<Alert> {
        self.transition(id, AlertTransition::Dismiss, user_id, |alert| {
            alert.dismiss(Utc::now())
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_for_case(&self, case_id: &str) -> Result<Vec<Alert>> {
        Ok(self.store.list_for_case(case_id).await?)
    }

    async fn load(&self, id: Uuid) -> Result<Alert> {
        self.store
            .get(id)
            .await?
            .ok_or(AlertServiceError::NotFound(id))
    }

    async fn transition(
        &self,
        id: Uuid,
        action: AlertTransition,
        user_id: &str,
        apply: impl FnOnce(&mut Alert) -> custos_core::Result<()>,
    ) -> Result<Alert> {
        let _writes = self.writes.lock().await;

        let current = self.load(id).await?;
        let mut next = current.clone();
        apply(&mut next).map_err(|e| rejected(&current, e))?;

        if !self.store.update(&next, current.status).await? {
            // Another writer moved the alert on.
            let latest = self.load(id).await?;
            return Err(rejected(
                &latest,
                CoreError::InvalidTransition {
                    from: latest.status,
                    action,
                },
            ));
        }

        let mut details = json!({ "case_id": next.case_id });
        if action == AlertTransition::Resolve {
            details["resolution_notes"] = json!(next.resolution_notes);
        }
        let recorded = self
            .audit
            .append(
                AuditRecord::new(audit_action(action), ALERT_TARGET)
                    .actor(user_id)
                    .target(next.id.to_string())
                    .details(details),
            )
            .await;
        if let Err(e) = recorded {
            match self.store.update(&current, next.status).await {
                Ok(true) => warn!(alert_id = %id, error = %e, "audit append failed, transition rolled back"),
                Ok(false) => error!(
                    alert_id = %id,
                    error = %e,
                    "audit append failed and the alert changed before rollback"
                ),
                Err(rollback) => error!(
                    alert_id = %id,
                    error = %e,
                    rollback_error = %rollback,
                    "audit append failed and the transition could not be rolled back"
                ),
            }
            return Err(e.into());
        }

        info!(alert_id = %id, action = %action, status = %next.status, user_id = %user_id, "alert transitioned");
        Ok(next)
    }
}

fn audit_action(action: AlertTransition) -> &'static str {
    match action {
        AlertTransition::Acknowledge => "alert.acknowledged",
        AlertTransition::Resolve => "alert.resolved",
        AlertTransition::Dismiss => "alert.dismissed",
    }
}

fn rejected(alert: &Alert, error: CoreError) -> AlertServiceError {
    warn!(alert_id = %alert.id, status = %alert.status, error = %error, "alert transition rejected");
    AlertServiceError::Transition(error)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use custos_audit::{DateRange, InMemoryAuditStore};
    use custos_core::{AlertStatus, Severity};

    use crate::test_support::{FlakyAuditStore, YieldingAlertStore};

    fn request(rule_id: &str, evidence_id: &str) -> AlertRequest {
        AlertRequest {
            case_id: "case-1".to_string(),
            rule_id: rule_id.to_string(),
            source_evidence_id: evidence_id.to_string(),
            severity: Severity::Medium,
            message: "check this".to_string(),
            evidence_refs: vec![evidence_id.to_string()],
        }
    }

    fn service(dedup: bool) -> (AlertService, InMemoryAlertStore, InMemoryAuditStore) {
        let alerts = InMemoryAlertStore::new();
        let audit_store = InMemoryAuditStore::new();
        let audit = Arc::new(AuditLogger::new(Arc::new(audit_store.clone())));
        (
            AlertService::new(Arc::new(alerts.clone()), audit).with_dedup(dedup),
            alerts,
            audit_store,
        )
    }

    async fn actions(audit: &AuditLogger) -> Vec<String> {
        audit
            .entries(DateRange::unbounded())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    #[tokio::test]
    async fn create_persists_and_audits() {
        let (svc, alerts, _) = service(false);
        let alert = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        assert_eq!(alert.status, AlertStatus::Pending);
        assert_eq!(alerts.len(), 1);

        let entries = svc.audit().entries(DateRange::unbounded()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "alert.created");
        assert_eq!(entries[0].target_type, ALERT_TARGET);
        assert_eq!(entries[0].target_id.as_deref(), Some(alert.id.to_string().as_str()));
        assert!(svc.audit().verify(entries[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn full_lifecycle_is_audited() {
        let (svc, _, _) = service(false);
        let alert = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();

        let acked = svc.acknowledge(alert.id, "attorney-1").await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("attorney-1"));

        let resolved = svc.resolve(alert.id, "attorney-1", "re-sealed").await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolution_notes.as_deref(), Some("re-sealed"));

        assert_eq!(
            actions(svc.audit()).await,
            vec!["alert.created", "alert.acknowledged", "alert.resolved"]
        );
    }

    #[tokio::test]
    async fn acknowledging_resolved_alert_is_rejected() {
        let (svc, _, _) = service(false);
        let alert = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        svc.acknowledge(alert.id, "a").await.unwrap();
        svc.resolve(alert.id, "a", "done").await.unwrap();

        let err = svc.acknowledge(alert.id, "a").await.unwrap_err();
        assert!(matches!(
            err,
            AlertServiceError::Transition(CoreError::InvalidTransition { .. })
        ));
        let stored = svc.get(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AlertStatus::Resolved);
        // Rejected transitions leave no audit entry.
        assert_eq!(actions(svc.audit()).await.len(), 3);
    }

    #[tokio::test]
    async fn dismiss_only_from_pending() {
        let (svc, _, _) = service(false);
        let first = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        let dismissed = svc.dismiss(first.id, "a").await.unwrap();
        assert_eq!(dismissed.status, AlertStatus::Dismissed);
        assert!(dismissed.closed_at.is_some());

        let second = svc.create(&request("r1", "ev-2")).await.unwrap().unwrap();
        svc.acknowledge(second.id, "a").await.unwrap();
        assert!(svc.dismiss(second.id, "a").await.is_err());
    }

    #[tokio::test]
    async fn unknown_alert_is_not_found() {
        let (svc, _, _) = service(false);
        let id = Uuid::new_v4();
        assert!(matches!(
            svc.acknowledge(id, "a").await,
            Err(AlertServiceError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn duplicates_created_without_dedup() {
        let (svc, alerts, _) = service(false);
        svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        assert_eq!(alerts.len(), 2);
    }

    #[tokio::test]
    async fn dedup_suppresses_while_open() {
        let (svc, alerts, audit_store) = service(true);
        let first = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        assert!(svc.create(&request("r1", "ev-1")).await.unwrap().is_none());
        // Different evidence or rule is a different key.
        assert!(svc.create(&request("r1", "ev-2")).await.unwrap().is_some());
        assert!(svc.create(&request("r2", "ev-1")).await.unwrap().is_some());
        assert_eq!(alerts.len(), 3);
        assert_eq!(audit_store.len(), 3);

        svc.dismiss(first.id, "a").await.unwrap();
        assert!(svc.create(&request("r1", "ev-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_for_case_in_creation_order() {
        let (svc, _, _) = service(false);
        let a = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();
        let b = svc.create(&request("r2", "ev-1")).await.unwrap().unwrap();
        let mut other = request("r3", "ev-9");
        other.case_id = "case-2".to_string();
        svc.create(&other).await.unwrap();

        let ids: Vec<_> = svc
            .list_for_case("case-1")
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    // ── Concurrency and audit failures ──────────────────────────────

    #[tokio::test]
    async fn racing_acknowledge_and_dismiss_only_one_wins() {
        let store = Arc::new(YieldingAlertStore::default());
        let audit = Arc::new(AuditLogger::new(Arc::new(InMemoryAuditStore::new())));
        let first = AlertService::new(store.clone(), Arc::clone(&audit));
        let second = AlertService::new(store.clone(), Arc::clone(&audit));
        let alert = first.create(&request("r1", "ev-1")).await.unwrap().unwrap();

        let (acked, dismissed) = tokio::join!(
            first.acknowledge(alert.id, "attorney-1"),
            second.dismiss(alert.id, "attorney-2")
        );
        assert!(acked.is_ok() != dismissed.is_ok());
        let loser = if acked.is_ok() { dismissed } else { acked };
        assert!(matches!(
            loser,
            Err(AlertServiceError::Transition(CoreError::InvalidTransition { .. }))
        ));

        let stored = first.get(alert.id).await.unwrap().unwrap();
        let expected = match stored.status {
            AlertStatus::Acknowledged => "alert.acknowledged",
            AlertStatus::Dismissed => "alert.dismissed",
            other => panic!("unexpected status {}", other),
        };
        assert_eq!(actions(&audit).await, vec!["alert.created", expected]);
    }

    #[tokio::test]
    async fn failed_audit_append_discards_new_alert() {
        let alerts = InMemoryAlertStore::new();
        let audit_store = FlakyAuditStore::default();
        audit_store.set_failing(true);
        let svc = AlertService::new(
            Arc::new(alerts.clone()),
            Arc::new(AuditLogger::new(Arc::new(audit_store.clone()))),
        )
        .with_dedup(true);

        let err = svc.create(&request("r1", "ev-1")).await.unwrap_err();
        assert!(matches!(err, AlertServiceError::Audit(_)));
        assert!(alerts.is_empty());

        // Nothing left behind to suppress the next attempt.
        audit_store.set_failing(false);
        assert!(svc.create(&request("r1", "ev-1")).await.unwrap().is_some());
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn failed_audit_append_rolls_back_transition() {
        let alerts = InMemoryAlertStore::new();
        let audit_store = FlakyAuditStore::default();
        let svc = AlertService::new(
            Arc::new(alerts.clone()),
            Arc::new(AuditLogger::new(Arc::new(audit_store.clone()))),
        );
        let alert = svc.create(&request("r1", "ev-1")).await.unwrap().unwrap();

        audit_store.set_failing(true);
        assert!(matches!(
            svc.acknowledge(alert.id, "a").await,
            Err(AlertServiceError::Audit(_))
        ));
        let stored = svc.get(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AlertStatus::Pending);
        assert!(stored.acknowledged_by.is_none());

        audit_store.set_failing(false);
        svc.dismiss(alert.id, "a").await.unwrap();
        assert_eq!(actions(svc.audit()).await, vec!["alert.created", "alert.dismissed"]);
    }
}
