//! Action executor: turns a matched rule's actions into alert requests.
//!
//! Every action of a matched rule is executed independently. A failure in
//! one action is returned in its slot of the result list and never prevents
//! the remaining actions from running.

mod template;

pub use template::interpolate;

use serde::Serialize;

use custos_core::{CaseId, EvidenceId, Severity};

use crate::context::FactContext;
use crate::schema::{Action, ActionKind, CompiledRule};

/// A single action failed to produce or persist its side effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("rule '{rule_id}': evidence '{evidence_id}' has no owning case to attach an alert to")]
    MissingCase {
        rule_id: String,
        evidence_id: EvidenceId,
    },

    #[error("rule '{rule_id}': failed to persist alert: {reason}")]
    Persist { rule_id: String, reason: String },
}

/// Alert creation request handed to the alert-persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRequest {
    pub case_id: CaseId,
    pub rule_id: String,
    pub source_evidence_id: EvidenceId,
    pub severity: Severity,
    /// Message after placeholder interpolation.
    pub message: String,
    pub evidence_refs: Vec<EvidenceId>,
}

/// Stateless action executor.
pub struct ActionExecutor;

impl ActionExecutor {
    /// Execute every action of `rule` for the evidence item `evidence_id`.
    ///
    /// The returned list has one slot per declared action, in order.
    pub fn execute(
        rule: &CompiledRule,
        ctx: &FactContext,
        evidence_id: &str,
    ) -> Vec<Result<AlertRequest, ActionError>> {
        rule.actions
            .iter()
            .map(|action| match action.kind {
                ActionKind::CreateAlert => create_alert(rule, action, ctx, evidence_id),
            })
            .collect()
    }
}

fn create_alert(
    rule: &CompiledRule,
    action: &Action,
    ctx: &FactContext,
    evidence_id: &str,
) -> Result<AlertRequest, ActionError> {
    let case_id = ["case.id", "evidence.case_id"]
        .iter()
        .find_map(|path| ctx.lookup(path).render().filter(|id| !id.is_empty()))
        .ok_or_else(|| ActionError::MissingCase {
            rule_id: rule.rule_id.clone(),
            evidence_id: evidence_id.to_string(),
        })?;

    let evidence_refs = if action.evidence_refs.is_empty() {
        vec![evidence_id.to_string()]
    } else {
        action.evidence_refs.clone()
    };

    Ok(AlertRequest {
        case_id,
        rule_id: rule.rule_id.clone(),
        source_evidence_id: evidence_id.to_string(),
        severity: action.severity,
        message: interpolate(&action.message, ctx),
        evidence_refs,
    })
}
