//! Evidence rule engine.
//!
//! This crate provides:
//! - Versioned YAML/JSON rule text compiled into [`schema::CompiledRule`]s
//! - A tagged [`value::Value`] fact model with dotted-path lookup
//! - Condition evaluation, alert actions with `{{path}}` interpolation
//! - Chain-of-custody gap detection feeding derived facts
//! - An engine with atomically swapped rule sets, an audited alert
//!   lifecycle, and rule administration

pub mod actions;
pub mod admin;
pub mod alerts;
pub mod compiler;
pub mod context;
pub mod custody;
pub mod engine;
pub mod evaluator;
pub mod schema;
pub mod sources;
pub mod store;
pub mod value;

#[cfg(test)]
mod test_support;

pub use actions::{ActionError, ActionExecutor, AlertRequest};
pub use admin::{AdminError, RuleAdmin};
pub use alerts::{AlertService, AlertServiceError, AlertStore, InMemoryAlertStore};
pub use compiler::{CompilationError, RuleCompiler};
pub use context::{FactContext, FieldPath};
pub use custody::ChainOfCustodyAnalyzer;
pub use engine::{CaseEvaluationReport, EngineError, EvaluationReport, ReloadSummary, RuleEngine};
pub use evaluator::{ConditionEvaluator, EvaluationError};
pub use schema::{CompiledRule, RuleDefinition};
pub use sources::{EvidenceSource, InMemoryEvidenceSource};
pub use store::{FsRuleStore, InMemoryRuleStore, RuleDefinitionStore, StoreError};
pub use value::Value;
