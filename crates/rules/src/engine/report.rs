//! Outcome records for reloads and evaluations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use custos_core::{Alert, CaseId, EvidenceId};

use crate::actions::ActionError;
use crate::compiler::CompilationError;
use crate::schema::CompiledRule;

/// Immutable snapshot of the compiled, active rules.
///
/// Replaced as a whole on reload; evaluations hold an `Arc` to the snapshot
/// they started with.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RuleSet {
    pub(super) fn new(rules: Vec<CompiledRule>, loaded_at: DateTime<Utc>) -> Self {
        Self {
            rules,
            loaded_at: Some(loaded_at),
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn get(&self, rule_id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.get(rule_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `None` until the first reload.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

/// A definition excluded from the rule set because it failed to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRule {
    pub rule_id: String,
    pub error: CompilationError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReloadSummary {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedRule>,
}

/// A single action of a matched rule that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub rule_id: String,
    /// Position of the action in the rule's action list.
    pub action_index: usize,
    pub error: String,
    #[serde(skip)]
    pub cause: ActionError,
}

/// Result of evaluating the active rule set against one evidence item.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub evidence_id: EvidenceId,
    pub rules_evaluated: usize,
    pub rules_matched: Vec<String>,
    pub alerts: Vec<Alert>,
    /// Alerts suppressed as duplicates of an open alert.
    pub suppressed: usize,
    pub failures: Vec<ActionFailure>,
}

impl EvaluationReport {
    pub(super) fn new(evidence_id: impl Into<EvidenceId>) -> Self {
        Self {
            evidence_id: evidence_id.into(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One [`EvaluationReport`] per evidence item of a case, in case order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaseEvaluationReport {
    pub case_id: CaseId,
    pub evidence: Vec<EvaluationReport>,
}

impl CaseEvaluationReport {
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.evidence.iter().flat_map(|r| r.alerts.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionFailure> {
        self.evidence.iter().flat_map(|r| r.failures.iter())
    }
}
