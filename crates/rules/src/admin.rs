//! Rule administration: create, update, and deactivate rule definitions.
//!
//! Every change is compiled before it is persisted, recorded in the audit
//! log, and followed by an engine reload. A change whose audit entry cannot
//! be written is undone in the store and the audit error is returned.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use custos_audit::{AuditError, AuditLogger, AuditRecord};

use crate::compiler::{CompilationError, RuleCompiler};
use crate::engine::{EngineError, RuleEngine};
use crate::schema::RuleDefinition;
use crate::store::{RuleDefinitionStore, StoreError};

/// Audit target type for rule definition entries.
pub const RULE_TARGET: &str = "rule";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("rule '{rule_id}' does not compile: {source}")]
    Compilation {
        rule_id: String,
        #[source]
        source: CompilationError,
    },

    #[error("rule '{0}' already exists")]
    AlreadyExists(String),

    #[error("rule '{0}' not found")]
    NotFound(String),

    #[error("rule store error: {0}")]
    Store(StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("engine reload failed: {0}")]
    Engine(#[from] EngineError),
}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(id) => AdminError::AlreadyExists(id),
            StoreError::NotFound(id) => AdminError::NotFound(id),
            other => AdminError::Store(other),
        }
    }
}

pub struct RuleAdmin {
    store: Arc<dyn RuleDefinitionStore>,
    engine: Arc<RuleEngine>,
    audit: Arc<AuditLogger>,
    /// Serializes change, audit, and rollback.
    changes: Mutex<()>,
}

impl RuleAdmin {
    pub fn new(
        store: Arc<dyn RuleDefinitionStore>,
        engine: Arc<RuleEngine>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            store,
            engine,
            audit,
            changes: Mutex::new(()),
        }
    }

    /// Add a new rule. Fails if the id is taken, even by an inactive rule.
    pub async fn create_rule(
        &self,
        definition: RuleDefinition,
        user_id: &str,
    ) -> Result<RuleDefinition, AdminError> {
        validate(&definition)?;
        let _changes = self.changes.lock().await;
        let stored = self.store.create(definition).await?;
        self.record("rule.created", &stored, None, user_id).await?;
        self.engine.reload_rules().await?;
        Ok(stored)
    }

    /// Replace an existing rule's definition.
    pub async fn update_rule(
        &self,
        definition: RuleDefinition,
        user_id: &str,
    ) -> Result<RuleDefinition, AdminError> {
        validate(&definition)?;
        let _changes = self.changes.lock().await;
        let previous = self
            .store
            .get(&definition.id)
            .await?
            .ok_or_else(|| AdminError::NotFound(definition.id.clone()))?;
        let stored = self.store.upsert(definition).await?;
        self.record("rule.updated", &stored, Some(previous), user_id)
            .await?;
        self.engine.reload_rules().await?;
        Ok(stored)
    }

    /// Deactivate a rule. The record is kept.
    pub async fn deactivate_rule(
        &self,
        rule_id: &str,
        user_id: &str,
    ) -> Result<RuleDefinition, AdminError> {
        let _changes = self.changes.lock().await;
        let previous = self
            .store
            .get(rule_id)
            .await?
            .ok_or_else(|| AdminError::NotFound(rule_id.to_string()))?;
        let stored = self.store.deactivate(rule_id).await?;
        self.record("rule.deactivated", &stored, Some(previous), user_id)
            .await?;
        self.engine.reload_rules().await?;
        Ok(stored)
    }

    /// Audit a persisted change; on failure put `previous` back.
    async fn record(
        &self,
        action: &str,
        definition: &RuleDefinition,
        previous: Option<RuleDefinition>,
        user_id: &str,
    ) -> Result<(), AdminError> {
        let recorded = self
            .audit
            .append(
                AuditRecord::new(action, RULE_TARGET)
                    .actor(user_id)
                    .target(definition.id.clone())
                    .details(json!({
                        "name": definition.name,
                        "owner": definition.owner,
                        "active": definition.active,
                    })),
            )
            .await;
        if let Err(e) = recorded {
            match self.store.restore(&definition.id, previous).await {
                Ok(()) => warn!(rule_id = %definition.id, action = %action, error = %e, "audit append failed, rule change rolled back"),
                Err(rollback) => error!(
                    rule_id = %definition.id,
                    action = %action,
                    error = %e,
                    rollback_error = %rollback,
                    "audit append failed and the rule change could not be rolled back"
                ),
            }
            return Err(e.into());
        }
        info!(rule_id = %definition.id, action = %action, user_id = %user_id, "rule definition changed");
        Ok(())
    }
}

fn validate(definition: &RuleDefinition) -> Result<(), AdminError> {
    RuleCompiler::compile(definition)
        .map(|_| ())
        .map_err(|source| AdminError::Compilation {
            rule_id: definition.id.clone(),
            source,
        })
}
