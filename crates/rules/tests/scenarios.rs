//! End-to-end scenarios: rule files on disk through the engine to audited alerts.

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use custos_audit::{AuditLogger, DateRange, InMemoryAuditStore};
use custos_core::{
    AlertStatus, CaseSnapshot, CoreError, CustodyAction, CustodyEntry, EvidenceSnapshot, Severity,
};
use custos_rules::custody::has_gap;
use custos_rules::{
    AlertService, AlertServiceError, FsRuleStore, InMemoryAlertStore, InMemoryEvidenceSource,
    RuleAdmin, RuleDefinition, RuleEngine,
};

const FUTURE_RECORD: &str = r#"
id: future-timestamp
name: Future-dated evidence
owner: defender-1
definition: |
  version: v1
  name: Future-dated evidence
  conditions:
    - field: evidence.timestamp
      operator: greater_than
      ref: now
  actions:
    - type: create_alert
      severity: medium
      message: "Evidence {{evidence.id}} is dated in the future"
"#;

const NO_ACTIONS_RECORD: &str = r#"
id: always-matches
name: Missing actions
owner: defender-1
definition: |
  name: Missing actions
  conditions:
    - field: evidence.id
      operator: exists
"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 10, 8, 30, 0).unwrap()
}

struct Harness {
    _dir: TempDir,
    dir_path: std::path::PathBuf,
    engine: Arc<RuleEngine>,
    source: InMemoryEvidenceSource,
    alerts: InMemoryAlertStore,
    audit: Arc<AuditLogger>,
}

fn harness() -> Harness {
    let dir = TempDir::new().expect("create tempdir");
    let dir_path = dir.path().to_path_buf();
    let source = InMemoryEvidenceSource::new();
    let alerts = InMemoryAlertStore::new();
    let audit = Arc::new(
        AuditLogger::new(Arc::new(InMemoryAuditStore::new())).with_signing_key("test-key"),
    );
    let service = Arc::new(AlertService::new(Arc::new(alerts.clone()), Arc::clone(&audit)));
    let engine = Arc::new(
        RuleEngine::new(
            Arc::new(FsRuleStore::new(&dir_path)),
            Arc::new(source.clone()),
            service,
        )
        .with_clock(Arc::new(now)),
    );

    source.put_case(CaseSnapshot {
        id: "case-7".to_string(),
        case_number: "CR-2024-0711".to_string(),
        status: "open".to_string(),
        created_at: now() - TimeDelta::days(90),
    });

    Harness {
        _dir: dir,
        dir_path,
        engine,
        source,
        alerts,
        audit,
    }
}

fn evidence(id: &str, timestamp: DateTime<Utc>) -> EvidenceSnapshot {
    EvidenceSnapshot {
        id: id.to_string(),
        case_id: "case-7".to_string(),
        evidence_type: "video".to_string(),
        timestamp: Some(timestamp),
        location: None,
        chain_of_custody: Vec::new(),
        attributes: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn future_timestamp_produces_one_medium_alert() {
    let h = harness();
    fs::write(h.dir_path.join("future.yml"), FUTURE_RECORD).unwrap();
    h.engine.reload_rules().await.unwrap();
    h.source
        .put_evidence(evidence("ev-bodycam-3", now() + TimeDelta::hours(1)));

    let report = h.engine.on_evidence_changed("ev-bodycam-3").await.unwrap();

    assert_eq!(report.alerts.len(), 1);
    let alert = &report.alerts[0];
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.message, "Evidence ev-bodycam-3 is dated in the future");
    assert_eq!(alert.rule_id, "future-timestamp");
    assert_eq!(alert.status, AlertStatus::Pending);
}

#[tokio::test]
async fn rule_missing_actions_never_alerts() {
    let h = harness();
    fs::write(h.dir_path.join("broken.yml"), NO_ACTIONS_RECORD).unwrap();
    let summary = h.engine.reload_rules().await.unwrap();

    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].rule_id, "always-matches");
    assert!(!h.engine.rule_set().contains("always-matches"));

    for i in 0..3 {
        let id = format!("ev-{}", i);
        h.source.put_evidence(evidence(&id, now()));
        h.engine.on_evidence_changed(&id).await.unwrap();
    }
    let report = h.engine.on_case_changed("case-7").await.unwrap();
    assert_eq!(report.alerts().count(), 0);
    assert!(h.alerts.is_empty());
}

#[test]
fn custody_gap_thresholds() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let entry = |h: i64| CustodyEntry::new(t0 + TimeDelta::hours(h), "clerk", CustodyAction::Stored);

    assert!(!has_gap(&[entry(0), entry(10), entry(30)], 24));
    assert!(has_gap(&[entry(0), entry(30)], 24));
    assert!(has_gap(&[entry(30), entry(0)], 24));
    assert!(!has_gap(&[entry(0)], 0));
    assert!(!has_gap(&[], 0));
}

#[tokio::test]
async fn acknowledging_resolved_alert_is_rejected() {
    let h = harness();
    fs::write(h.dir_path.join("future.yml"), FUTURE_RECORD).unwrap();
    h.engine.reload_rules().await.unwrap();
    h.source.put_evidence(evidence("ev-1", now() + TimeDelta::hours(1)));
    let report = h.engine.on_evidence_changed("ev-1").await.unwrap();
    let id = report.alerts[0].id;

    let service = h.engine.alerts();
    service.acknowledge(id, "attorney-4").await.unwrap();
    service.resolve(id, "attorney-4", "metadata clock skew confirmed").await.unwrap();
    let err = service.acknowledge(id, "attorney-4").await.unwrap_err();
    assert!(matches!(
        err,
        AlertServiceError::Transition(CoreError::InvalidTransition {
            from: AlertStatus::Resolved,
            ..
        })
    ));
}

#[tokio::test]
async fn every_change_is_audited_and_verifiable() {
    let h = harness();
    let admin = RuleAdmin::new(
        Arc::new(FsRuleStore::new(&h.dir_path)),
        Arc::clone(&h.engine),
        Arc::clone(&h.audit),
    );
    let text = r#"
name: Unlocated evidence
conditions: [{field: evidence.location, operator: not_exists}]
actions: [{type: create_alert, severity: low, message: "{{evidence.id}} has no location"}]
"#;
    admin
        .create_rule(
            RuleDefinition::new("unlocated", "Unlocated evidence", "defender-1", text),
            "defender-1",
        )
        .await
        .unwrap();
    assert!(h.dir_path.join("unlocated.yml").exists());

    h.source.put_evidence(evidence("ev-1", now()));
    let report = h.engine.on_evidence_changed("ev-1").await.unwrap();
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].message, "ev-1 has no location");

    h.engine
        .alerts()
        .dismiss(report.alerts[0].id, "defender-1")
        .await
        .unwrap();

    let entries = h.audit.entries(DateRange::unbounded()).await.unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["rule.created", "alert.created", "alert.dismissed"]);
    assert!(h.audit.verify_all().await.unwrap().is_intact());

    let exported = h
        .audit
        .export_for_external_auditor(DateRange::unbounded(), Some("alert"))
        .await
        .unwrap();
    assert_eq!(exported.len(), 2);
    let json = serde_json::to_value(&exported).unwrap();
    for item in json.as_array().unwrap() {
        let obj = item.as_object().unwrap();
        assert!(!obj.contains_key("details"));
        assert!(!obj.contains_key("user_id"));
        assert!(!obj.contains_key("target_id"));
    }
}
