//! Tests for the rule definition stores.

use std::fs;

use chrono::{TimeDelta, Utc};
use tempfile::TempDir;

use super::*;

const RECORD_YAML: &str = r#"
id: future-timestamp
name: Future-dated evidence
owner: defender-1
active: true
created_at: 2024-03-01T09:00:00Z
updated_at: 2024-03-01T09:00:00Z
definition: |
  name: Future-dated evidence
  conditions:
    - field: evidence.timestamp
      operator: greater_than
      ref: now
  actions:
    - type: create_alert
      message: "Evidence {{evidence.id}} is dated in the future"
"#;

fn temp_store() -> (TempDir, FsRuleStore) {
    let dir = TempDir::new().expect("create tempdir");
    let store = FsRuleStore::new(dir.path());
    (dir, store)
}

fn definition(id: &str) -> RuleDefinition {
    RuleDefinition::new(id, format!("Rule {}", id), "defender-1", "name: x")
}

// ── Filesystem store ────────────────────────────────────────────────

#[test]
fn load_record_from_file() {
    let (dir, store) = temp_store();
    let path = dir.path().join("future.yml");
    fs::write(&path, RECORD_YAML).unwrap();

    let def = store.load_file(&path).unwrap();
    assert_eq!(def.id, "future-timestamp");
    assert_eq!(def.owner, "defender-1");
    assert!(def.active);
    assert!(def.definition.contains("greater_than"));
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("rule1.yml"), RECORD_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), RECORD_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not a rule").unwrap();

    let results = store.load_all().unwrap();
    let loaded: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Loaded { .. }))
        .collect();
    let skipped: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .collect();
    assert_eq!(loaded.len(), 1);
    assert_eq!(skipped.len(), 2);
}

#[test]
fn load_all_reports_bad_files_without_aborting() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("a-good.yml"), RECORD_YAML).unwrap();
    fs::write(dir.path().join("b-bad.yml"), "id: [unclosed").unwrap();
    fs::write(dir.path().join("c-unknown-key.yml"), format!("{}\nextra: 1\n", RECORD_YAML)).unwrap();
    fs::write(dir.path().join("d-dup.yaml"), RECORD_YAML).unwrap();

    let results = store.load_all().unwrap();
    let failed = results.iter().filter(|r| r.status.is_failed()).count();
    assert_eq!(failed, 3);
    assert!(matches!(
        &results[0].status,
        LoadStatus::Loaded { rule_id } if rule_id == "future-timestamp"
    ));
}

#[tokio::test]
async fn active_definitions_rescans_directory() {
    let (dir, store) = temp_store();
    assert!(store.active_definitions().await.unwrap().is_empty());

    fs::write(dir.path().join("future.yml"), RECORD_YAML).unwrap();
    let active = store.active_definitions().await.unwrap();
    assert_eq!(active.len(), 1);

    fs::remove_file(dir.path().join("future.yml")).unwrap();
    assert!(store.active_definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_writes_atomically_and_preserves_created_at() {
    let (dir, store) = temp_store();
    let mut def = definition("custody-gap");
    def.created_at = Utc::now() - TimeDelta::days(10);
    let first = store.upsert(def.clone()).await.unwrap();
    assert_eq!(first.created_at, def.created_at);
    assert!(dir.path().join("custody-gap.yml").exists());
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let mut changed = definition("custody-gap");
    changed.name = "Renamed".to_string();
    let second = store.upsert(changed).await.unwrap();
    assert_eq!(second.created_at, def.created_at);
    assert!(second.updated_at >= first.updated_at);

    let reloaded = store.get("custody-gap").await.unwrap().unwrap();
    assert_eq!(reloaded.name, "Renamed");
    assert_eq!(reloaded.created_at, def.created_at);
}

#[tokio::test]
async fn deactivate_writes_back_to_source_file() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("legacy-name.yaml"), RECORD_YAML).unwrap();
    store.deactivate("future-timestamp").await.unwrap();

    assert!(!dir.path().join("future-timestamp.yml").exists());
    let results = store.load_all().unwrap();
    assert_eq!(results.len(), 1);
    assert!(store.active_definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivate_keeps_the_record() {
    let (_dir, store) = temp_store();
    store.upsert(definition("r1")).await.unwrap();
    store.upsert(definition("r2")).await.unwrap();

    let def = store.deactivate("r1").await.unwrap();
    assert!(!def.active);

    let active = store.active_definitions().await.unwrap();
    assert_eq!(active.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["r2"]);
    assert!(store.get("r1").await.unwrap().is_some());
    assert!(matches!(
        store.deactivate("missing").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn create_refuses_taken_ids() {
    let (dir, store) = temp_store();
    store.create(definition("r1")).await.unwrap();
    assert!(dir.path().join("r1.yml").exists());
    assert!(matches!(
        store.create(definition("r1")).await,
        Err(StoreError::AlreadyExists(id)) if id == "r1"
    ));

    // An inactive record under another file name still holds its id.
    fs::write(dir.path().join("legacy-name.yaml"), RECORD_YAML).unwrap();
    store.deactivate("future-timestamp").await.unwrap();
    assert!(matches!(
        store.create(definition("future-timestamp")).await,
        Err(StoreError::AlreadyExists(_))
    ));
    assert!(!dir.path().join("future-timestamp.yml").exists());
}

#[tokio::test]
async fn concurrent_creates_of_one_id_admit_exactly_one() {
    let (dir, store) = temp_store();
    let (a, b) = tokio::join!(store.create(definition("r1")), store.create(definition("r1")));
    assert!(a.is_ok() != b.is_ok());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn restore_puts_back_or_removes() {
    let (dir, store) = temp_store();
    fs::write(dir.path().join("legacy-name.yaml"), RECORD_YAML).unwrap();
    let before = store.get("future-timestamp").await.unwrap().unwrap();
    store.deactivate("future-timestamp").await.unwrap();

    store.restore("future-timestamp", Some(before.clone())).await.unwrap();
    let restored = store.get("future-timestamp").await.unwrap().unwrap();
    assert!(restored.active);
    assert_eq!(restored.updated_at, before.updated_at);
    assert!(!dir.path().join("future-timestamp.yml").exists());

    store.create(definition("r1")).await.unwrap();
    store.restore("r1", None).await.unwrap();
    assert!(store.get("r1").await.unwrap().is_none());
    assert!(!dir.path().join("r1.yml").exists());
}

#[tokio::test]
async fn unsafe_ids_are_rejected() {
    let (_dir, store) = temp_store();
    for id in ["", "../escape", ".hidden", "a/b"] {
        assert!(
            matches!(store.upsert(definition(id)).await, Err(StoreError::Validation(_))),
            "id {:?} should be rejected",
            id
        );
    }
}

// ── In-memory store ─────────────────────────────────────────────────

#[tokio::test]
async fn memory_store_orders_and_filters_active() {
    let store = InMemoryRuleStore::new();
    store.upsert(definition("b")).await.unwrap();
    store.upsert(definition("a")).await.unwrap();
    store.upsert(definition("c")).await.unwrap();
    store.deactivate("c").await.unwrap();

    let ids: Vec<_> = store
        .active_definitions()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn memory_store_upsert_preserves_created_at() {
    let mut seeded = definition("r1");
    seeded.created_at = Utc::now() - TimeDelta::days(3);
    let store = InMemoryRuleStore::with_definitions([seeded.clone()]);

    let updated = store.upsert(definition("r1")).await.unwrap();
    assert_eq!(updated.created_at, seeded.created_at);
    assert!(updated.updated_at > seeded.created_at);
}

#[tokio::test]
async fn memory_store_create_and_restore() {
    let store = InMemoryRuleStore::new();
    let created = store.create(definition("r1")).await.unwrap();
    assert!(matches!(
        store.create(definition("r1")).await,
        Err(StoreError::AlreadyExists(_))
    ));

    store.deactivate("r1").await.unwrap();
    store.restore("r1", Some(created.clone())).await.unwrap();
    assert_eq!(store.get("r1").await.unwrap(), Some(created));

    store.restore("r1", None).await.unwrap();
    assert!(store.get("r1").await.unwrap().is_none());
}
