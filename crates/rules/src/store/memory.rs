//! In-memory rule definition store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::schema::RuleDefinition;

use super::{validate_id, Result, RuleDefinitionStore, StoreError};

/// Rule definitions held in a map keyed by id.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    definitions: Arc<RwLock<BTreeMap<String, RuleDefinition>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without touching timestamps.
    pub fn with_definitions(definitions: impl IntoIterator<Item = RuleDefinition>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.definitions.write().expect("rule store lock poisoned");
            for def in definitions {
                guard.insert(def.id.clone(), def);
            }
        }
        store
    }
}

#[async_trait]
impl RuleDefinitionStore for InMemoryRuleStore {
    async fn active_definitions(&self) -> Result<Vec<RuleDefinition>> {
        let guard = self.definitions.read().expect("rule store lock poisoned");
        Ok(guard.values().filter(|d| d.active).cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<RuleDefinition>> {
        let guard = self.definitions.read().expect("rule store lock poisoned");
        Ok(guard.get(id).cloned())
    }

    async fn create(&self, mut definition: RuleDefinition) -> Result<RuleDefinition> {
        validate_id(&definition.id)?;
        let mut guard = self.definitions.write().expect("rule store lock poisoned");
        if guard.contains_key(&definition.id) {
            return Err(StoreError::AlreadyExists(definition.id));
        }
        definition.updated_at = Utc::now();
        guard.insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    async fn upsert(&self, mut definition: RuleDefinition) -> Result<RuleDefinition> {
        validate_id(&definition.id)?;
        let mut guard = self.definitions.write().expect("rule store lock poisoned");
        let now = Utc::now();
        if let Some(existing) = guard.get(&definition.id) {
            definition.created_at = existing.created_at;
        }
        definition.updated_at = now;
        guard.insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    async fn deactivate(&self, id: &str) -> Result<RuleDefinition> {
        let mut guard = self.definitions.write().expect("rule store lock poisoned");
        let def = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        def.active = false;
        def.updated_at = Utc::now();
        Ok(def.clone())
    }

    async fn restore(&self, id: &str, previous: Option<RuleDefinition>) -> Result<()> {
        let mut guard = self.definitions.write().expect("rule store lock poisoned");
        match previous {
            Some(def) => guard.insert(id.to_string(), def),
            None => guard.remove(id),
        };
        Ok(())
    }
}
