//! [`FsRuleStore`]: one YAML rule definition record per file in a directory.
//!
//! The directory is rescanned on every [`active_definitions`] call, so a rule
//! file dropped in by an operator is picked up on the next engine reload.
//! Writes go through a uniquely named dot-prefixed temp file and a rename
//! (a hard link for create-only writes, which fails if the target exists).
//! Writes from one store instance are serialized.
//!
//! [`active_definitions`]: RuleDefinitionStore::active_definitions

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::schema::RuleDefinition;

use super::error::{LoadResult, LoadStatus};
use super::{validate_id, Result, RuleDefinitionStore, StoreError};

/// Filesystem-backed rule definition store.
pub struct FsRuleStore {
    rules_dir: PathBuf,
    /// Definitions from the last scan, keyed by id, with the file they came from.
    definitions: Arc<RwLock<BTreeMap<String, (PathBuf, RuleDefinition)>>>,
    /// Held across every read-check-write sequence.
    writes: Mutex<()>,
}

impl FsRuleStore {
    /// Create a store for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        let rules_dir = rules_dir.into();
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            definitions: Arc::new(RwLock::new(BTreeMap::new())),
            writes: Mutex::new(()),
        }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Scan the rules directory and replace the in-memory view.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse errors and duplicate
    /// ids are reported per file and do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.rules_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        paths.sort();

        let mut loaded = BTreeMap::new();
        let mut results = Vec::with_capacity(paths.len());

        for path in paths {
            if path.is_dir() {
                continue;
            }
            if let Some(reason) = skip_reason(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: reason.to_string(),
                    },
                });
                continue;
            }

            let status = match load_file(&path) {
                Ok(def) if loaded.contains_key(&def.id) => {
                    warn!(rule_id = %def.id, path = %path.display(), "duplicate rule id, keeping first file");
                    LoadStatus::Failed {
                        error: format!("duplicate rule id '{}'", def.id),
                    }
                }
                Ok(def) => {
                    let rule_id = def.id.clone();
                    loaded.insert(rule_id.clone(), (path.clone(), def));
                    LoadStatus::Loaded { rule_id }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule definition file");
                    LoadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(LoadResult { path, status });
        }

        info!(path = %self.rules_dir.display(), count = loaded.len(), "scanned rule definitions");
        *self.definitions.write().expect("rule definitions lock poisoned") = loaded;
        Ok(results)
    }

    /// Parse a single rule definition file.
    pub fn load_file(&self, path: &Path) -> Result<RuleDefinition> {
        load_file(path)
    }

    /// Atomically write a definition back to the file it was loaded from,
    /// or to `<id>.yml` for a new record.
    ///
    /// With `create_only` the write fails with [`StoreError::AlreadyExists`]
    /// if the target file exists.
    fn write_definition(&self, def: &RuleDefinition, create_only: bool) -> Result<PathBuf> {
        let final_path = self
            .definitions
            .read()
            .expect("rule definitions lock poisoned")
            .get(&def.id)
            .map(|(path, _)| path.clone())
            .unwrap_or_else(|| self.rules_dir.join(format!("{}.yml", def.id)));
        let tmp_path = self
            .rules_dir
            .join(format!(".{}.{}.tmp", def.id, Uuid::new_v4().simple()));

        let yaml = serde_yaml::to_string(def)?;
        fs::write(&tmp_path, yaml)?;
        let placed = if create_only {
            fs::hard_link(&tmp_path, &final_path)
        } else {
            fs::rename(&tmp_path, &final_path)
        };
        if create_only || placed.is_err() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %e, "failed to remove temp file");
            }
        }
        if let Err(e) = placed {
            if e.kind() == ErrorKind::AlreadyExists {
                return Err(StoreError::AlreadyExists(def.id.clone()));
            }
            return Err(e.into());
        }

        info!(rule_id = %def.id, path = %final_path.display(), "wrote rule definition file");
        self.definitions
            .write()
            .expect("rule definitions lock poisoned")
            .insert(def.id.clone(), (final_path.clone(), def.clone()));
        Ok(final_path)
    }

    /// Current on-disk record for `id`, if any. Rescans the directory first.
    fn read_existing(&self, id: &str) -> Result<Option<RuleDefinition>> {
        self.load_all()?;
        let guard = self.definitions.read().expect("rule definitions lock poisoned");
        Ok(guard.get(id).map(|(_, def)| def.clone()))
    }
}

fn skip_reason(path: &Path) -> Option<&'static str> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with('.') {
        return Some("dotfile");
    }
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false);
    (!is_yaml).then_some("not a YAML file")
}

fn load_file(path: &Path) -> Result<RuleDefinition> {
    let contents = fs::read_to_string(path)?;
    let def: RuleDefinition = serde_yaml::from_str(&contents)?;
    validate_id(&def.id)?;
    Ok(def)
}

#[async_trait]
impl RuleDefinitionStore for FsRuleStore {
    async fn active_definitions(&self) -> Result<Vec<RuleDefinition>> {
        self.load_all()?;
        let guard = self.definitions.read().expect("rule definitions lock poisoned");
        Ok(guard
            .values()
            .map(|(_, def)| def)
            .filter(|def| def.active)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<RuleDefinition>> {
        validate_id(id)?;
        self.read_existing(id)
    }

    async fn create(&self, mut definition: RuleDefinition) -> Result<RuleDefinition> {
        validate_id(&definition.id)?;
        let _writes = self.writes.lock().expect("rule writes lock poisoned");
        if self.read_existing(&definition.id)?.is_some() {
            return Err(StoreError::AlreadyExists(definition.id));
        }
        definition.updated_at = Utc::now();
        self.write_definition(&definition, true)?;
        Ok(definition)
    }

    async fn upsert(&self, mut definition: RuleDefinition) -> Result<RuleDefinition> {
        validate_id(&definition.id)?;
        let _writes = self.writes.lock().expect("rule writes lock poisoned");
        if let Some(existing) = self.read_existing(&definition.id)? {
            definition.created_at = existing.created_at;
        }
        definition.updated_at = Utc::now();
        self.write_definition(&definition, false)?;
        Ok(definition)
    }

    async fn deactivate(&self, id: &str) -> Result<RuleDefinition> {
        validate_id(id)?;
        let _writes = self.writes.lock().expect("rule writes lock poisoned");
        let mut def = self
            .read_existing(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.active = false;
        def.updated_at = Utc::now();
        self.write_definition(&def, false)?;
        Ok(def)
    }

    async fn restore(&self, id: &str, previous: Option<RuleDefinition>) -> Result<()> {
        validate_id(id)?;
        let _writes = self.writes.lock().expect("rule writes lock poisoned");
        match previous {
            Some(def) => {
                self.write_definition(&def, false)?;
            }
            None => {
                self.load_all()?;
                let removed = self
                    .definitions
                    .write()
                    .expect("rule definitions lock poisoned")
                    .remove(id);
                if let Some((path, _)) = removed {
                    fs::remove_file(&path)?;
                    info!(rule_id = %id, path = %path.display(), "removed rule definition file");
                }
            }
        }
        Ok(())
    }
}
