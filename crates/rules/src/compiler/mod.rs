//! Rule compiler: the single boundary where human-edited rule text enters the
//! deterministic core.
//!
//! [`RuleCompiler::compile`] parses a [`RuleDefinition`]'s text into a
//! [`CompiledRule`] or rejects it with a [`CompilationError`]. Nothing past
//! this module ever sees unvalidated structure. Compilation is pure: the same
//! definition always yields a structurally equal result.

mod error;
mod suggest;


pub use error::CompilationError;

use custos_core::Severity;

use crate::context::FieldPath;
use crate::schema::body::{ActionBody, ConditionBody, RuleBody};
use crate::schema::{
    Action, ActionKind, CompiledRule, Condition, Operand, Operator, RuleDefinition,
    SUPPORTED_VERSIONS,
};
use crate::value::Value;

use suggest::closest;

/// Version assumed when the rule text does not declare one.
pub const DEFAULT_VERSION: &str = "v1";

/// Severity assumed when an action does not declare one.
pub const DEFAULT_SEVERITY: Severity = Severity::Medium;

/// Stateless rule compiler.
pub struct RuleCompiler;

impl RuleCompiler {
    /// Compile a stored rule definition.
    ///
    /// A `name` inside the rule text wins; the record's own name is used when
    /// the text does not declare one.
    pub fn compile(definition: &RuleDefinition) -> Result<CompiledRule, CompilationError> {
        compile_body(&definition.id, &definition.definition, Some(&definition.name))
    }

    /// Compile raw rule text under the given rule id. The text must carry its
    /// own `name`.
    pub fn compile_text(rule_id: &str, text: &str) -> Result<CompiledRule, CompilationError> {
        compile_body(rule_id, text, None)
    }
}

fn compile_body(
    rule_id: &str,
    text: &str,
    record_name: Option<&str>,
) -> Result<CompiledRule, CompilationError> {
    let body: RuleBody = if text.trim().is_empty() {
        RuleBody::default()
    } else {
        serde_yaml::from_str::<Option<RuleBody>>(text)
            .map_err(|e| CompilationError::Syntax(e.to_string()))?
            // A document consisting only of `null` or comments.
            .unwrap_or_default()
    };

    let version = match body.version {
        None => DEFAULT_VERSION.to_string(),
        Some(v) if SUPPORTED_VERSIONS.contains(&v.as_str()) => v,
        Some(v) => return Err(CompilationError::UnsupportedVersion(v)),
    };

    let name = body
        .name
        .as_deref()
        .into_iter()
        .chain(record_name)
        .map(str::trim)
        .find(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or(CompilationError::MissingName)?;

    let conditions = body
        .conditions
        .filter(|c| !c.is_empty())
        .ok_or(CompilationError::MissingConditions)?;
    let actions = body
        .actions
        .filter(|a| !a.is_empty())
        .ok_or(CompilationError::MissingActions)?;

    let conditions = conditions
        .iter()
        .enumerate()
        .map(|(i, c)| compile_condition(i, c))
        .collect::<Result<Vec<_>, _>>()?;
    let actions = actions
        .iter()
        .enumerate()
        .map(|(i, a)| compile_action(i, a))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        rule_id: rule_id.to_string(),
        name,
        description: body.description,
        version,
        conditions,
        actions,
    })
}

fn compile_condition(index: usize, body: &ConditionBody) -> Result<Condition, CompilationError> {
    let field = body
        .field
        .as_deref()
        .ok_or(CompilationError::MissingField { index })?
        .parse::<FieldPath>()
        .map_err(|reason| CompilationError::InvalidFieldPath { index, reason })?;

    let raw_op = body
        .operator
        .as_deref()
        .map(str::trim)
        .ok_or(CompilationError::MissingOperator { index })?;
    let operator = raw_op.parse::<Operator>().map_err(|_| CompilationError::UnknownOperator {
        index,
        operator: raw_op.to_string(),
        suggestion: closest(raw_op, &Operator::names()),
    })?;

    let operand = match (&body.value, &body.reference) {
        (Some(_), Some(_)) => return Err(CompilationError::ConflictingOperand { index }),
        (None, None) if operator.takes_operand() => {
            return Err(CompilationError::MissingOperand {
                index,
                operator: operator.to_string(),
            })
        }
        (None, None) => Operand::None,
        (Some(_), None) | (None, Some(_)) if !operator.takes_operand() => {
            return Err(CompilationError::UnexpectedOperand {
                index,
                operator: operator.to_string(),
            })
        }
        (Some(literal), None) => Operand::Literal(
            Value::from_yaml(literal)
                .map_err(|reason| CompilationError::InvalidLiteral { index, reason })?,
        ),
        (None, Some(reference)) => Operand::Field(
            reference
                .parse::<FieldPath>()
                .map_err(|reason| CompilationError::InvalidFieldPath { index, reason })?,
        ),
    };

    Ok(Condition {
        field,
        operator,
        operand,
    })
}

fn compile_action(index: usize, body: &ActionBody) -> Result<Action, CompilationError> {
    let raw_kind = body
        .kind
        .as_deref()
        .map(str::trim)
        .ok_or(CompilationError::MissingActionKind { index })?;
    let kind = raw_kind.parse::<ActionKind>().map_err(|_| CompilationError::UnknownActionKind {
        index,
        kind: raw_kind.to_string(),
        suggestion: closest(raw_kind, &ActionKind::names()),
    })?;

    let severity = match body.severity.as_deref() {
        None => DEFAULT_SEVERITY,
        Some(s) => s
            .trim()
            .to_lowercase()
            .parse::<Severity>()
            .map_err(|_| CompilationError::InvalidSeverity {
                index,
                severity: s.to_string(),
            })?,
    };

    let message = body
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or(CompilationError::MissingMessage { index })?
        .to_string();

    Ok(Action {
        kind,
        severity,
        message,
        evidence_refs: body.evidence_refs.clone().unwrap_or_default(),
    })
}
