//! Rule engine: loads the active rule set and evaluates it against evidence.
//!
//! The compiled rule set is an immutable [`RuleSet`] behind an `Arc` that a
//! reload swaps in one step. An evaluation takes a clone of the `Arc` when it
//! starts, so it sees either the old or the new set in full. Reloads are
//! serialized among themselves and happen only when [`RuleEngine::reload_rules`]
//! is called.

mod report;


pub use report::{
    ActionFailure, CaseEvaluationReport, EvaluationReport, ReloadSummary, RuleSet, SkippedRule,
};

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use custos_core::{CaseSnapshot, EvidenceSnapshot};

use crate::actions::{ActionError, ActionExecutor};
use crate::alerts::AlertService;
use crate::compiler::RuleCompiler;
use crate::context::FactContext;
use crate::custody::ChainOfCustodyAnalyzer;
use crate::evaluator::ConditionEvaluator;
use crate::sources::EvidenceSource;
use crate::store::{RuleDefinitionStore, StoreError};

/// Source of the `now` value placed in every fact context.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("evidence '{0}' not found")]
    EvidenceNotFound(String),

    #[error("case '{0}' not found")]
    CaseNotFound(String),

    #[error("collaborator error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

pub struct RuleEngine {
    definitions: Arc<dyn RuleDefinitionStore>,
    evidence: Arc<dyn EvidenceSource>,
    alerts: Arc<AlertService>,
    custody: ChainOfCustodyAnalyzer,
    active: RwLock<Arc<RuleSet>>,
    reload_lock: Mutex<()>,
    clock: Clock,
}

impl RuleEngine {
    /// Create an engine with an empty rule set. Call
    /// [`reload_rules`](Self::reload_rules) before evaluating.
    pub fn new(
        definitions: Arc<dyn RuleDefinitionStore>,
        evidence: Arc<dyn EvidenceSource>,
        alerts: Arc<AlertService>,
    ) -> Self {
        Self {
            definitions,
            evidence,
            alerts,
            custody: ChainOfCustodyAnalyzer::default(),
            active: RwLock::new(Arc::new(RuleSet::default())),
            reload_lock: Mutex::new(()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_custody_analyzer(mut self, custody: ChainOfCustodyAnalyzer) -> Self {
        self.custody = custody;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn alerts(&self) -> &Arc<AlertService> {
        &self.alerts
    }

    /// The rule set currently used for new evaluations.
    pub fn rule_set(&self) -> Arc<RuleSet> {
        Arc::clone(&self.active.read().expect("rule set lock poisoned"))
    }

    // ── Reload ──────────────────────────────────────────────────────

    /// Re-read active definitions, compile them, and swap in the new set.
    ///
    /// Definitions that fail to compile are excluded and reported. If the
    /// store cannot be read the previous set stays in place.
    pub async fn reload_rules(&self) -> Result<ReloadSummary> {
        let _guard = self.reload_lock.lock().await;

        let definitions = self.definitions.active_definitions().await?;
        let mut summary = ReloadSummary::default();
        let mut compiled = Vec::with_capacity(definitions.len());

        for def in &definitions {
            match RuleCompiler::compile(def) {
                Ok(rule) => {
                    summary.loaded.push(rule.rule_id.clone());
                    compiled.push(rule);
                }
                Err(e) => {
                    warn!(rule_id = %def.id, error = %e, "rule failed to compile, excluded from rule set");
                    summary.skipped.push(SkippedRule {
                        rule_id: def.id.clone(),
                        error: e,
                    });
                }
            }
        }

        let set = Arc::new(RuleSet::new(compiled, Utc::now()));
        *self.active.write().expect("rule set lock poisoned") = set;

        info!(
            loaded = summary.loaded.len(),
            skipped = summary.skipped.len(),
            "rule set reloaded"
        );
        Ok(summary)
    }

    // ── Triggers ────────────────────────────────────────────────────

    /// Evaluate every active rule against one evidence item.
    pub async fn on_evidence_changed(&self, evidence_id: &str) -> Result<EvaluationReport> {
        let rules = self.rule_set();
        let evidence = self
            .evidence
            .evidence(evidence_id)
            .await?
            .ok_or_else(|| EngineError::EvidenceNotFound(evidence_id.to_string()))?;
        let case = self.evidence.case(&evidence.case_id).await?;
        if case.is_none() {
            debug!(evidence_id = %evidence_id, case_id = %evidence.case_id, "owning case not found, evaluating without case facts");
        }
        Ok(self.evaluate(&rules, &evidence, case.as_ref()).await)
    }

    /// Evaluate every evidence item of a case, in case-insertion order, all
    /// against the same rule set.
    pub async fn on_case_changed(&self, case_id: &str) -> Result<CaseEvaluationReport> {
        let rules = self.rule_set();
        let case = self
            .evidence
            .case(case_id)
            .await?
            .ok_or_else(|| EngineError::CaseNotFound(case_id.to_string()))?;
        let items = self.evidence.evidence_for_case(case_id).await?;

        let mut report = CaseEvaluationReport {
            case_id: case_id.to_string(),
            evidence: Vec::with_capacity(items.len()),
        };
        for evidence in &items {
            report
                .evidence
                .push(self.evaluate(&rules, evidence, Some(&case)).await);
        }

        info!(
            case_id = %case_id,
            evidence = items.len(),
            alerts = report.alerts().count(),
            "case evaluated"
        );
        Ok(report)
    }

    /// Evaluate `rules` against one evidence item. Never fails as a whole:
    /// action failures are collected in the report.
    pub async fn evaluate(
        &self,
        rules: &RuleSet,
        evidence: &EvidenceSnapshot,
        case: Option<&CaseSnapshot>,
    ) -> EvaluationReport {
        let ctx = FactContext::build(evidence, case, (self.clock)(), &self.custody);
        let mut report = EvaluationReport::new(evidence.id.clone());

        for rule in rules.rules() {
            report.rules_evaluated += 1;
            if !ConditionEvaluator::evaluate(&rule.conditions, &ctx) {
                continue;
            }
            debug!(rule_id = %rule.rule_id, evidence_id = %evidence.id, "rule matched");
            report.rules_matched.push(rule.rule_id.clone());

            for (action_index, outcome) in ActionExecutor::execute(rule, &ctx, &evidence.id)
                .into_iter()
                .enumerate()
            {
                let result = match outcome {
                    Ok(request) => self.alerts.create(&request).await.map_err(|e| {
                        ActionError::Persist {
                            rule_id: rule.rule_id.clone(),
                            reason: e.to_string(),
                        }
                    }),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(Some(alert)) => report.alerts.push(alert),
                    Ok(None) => report.suppressed += 1,
                    Err(e) => {
                        warn!(rule_id = %rule.rule_id, evidence_id = %evidence.id, action_index, error = %e, "rule action failed");
                        report.failures.push(ActionFailure {
                            rule_id: rule.rule_id.clone(),
                            action_index,
                            error: e.to_string(),
                            cause: e,
                        });
                    }
                }
            }
        }

        report
    }
}
