//! Compilation errors for rule definitions.

use super::suggest::did_you_mean;

/// Why a rule definition did not produce a compiled rule.
///
/// Condition and action indices are zero-based positions in the rule text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompilationError {
    #[error("rule text is not valid YAML/JSON: {0}")]
    Syntax(String),

    #[error("unsupported rule schema version '{0}'")]
    UnsupportedVersion(String),

    #[error("rule has no name")]
    MissingName,

    #[error("rule has no conditions")]
    MissingConditions,

    #[error("rule has no actions")]
    MissingActions,

    #[error("condition {index}: missing field")]
    MissingField { index: usize },

    #[error("condition {index}: {reason}")]
    InvalidFieldPath { index: usize, reason: String },

    #[error("condition {index}: missing operator")]
    MissingOperator { index: usize },

    #[error("condition {index}: unknown operator '{operator}'{}", did_you_mean(.suggestion))]
    UnknownOperator {
        index: usize,
        operator: String,
        suggestion: Option<&'static str>,
    },

    #[error("condition {index}: operator '{operator}' requires a value or ref")]
    MissingOperand { index: usize, operator: String },

    #[error("condition {index}: operator '{operator}' takes no value or ref")]
    UnexpectedOperand { index: usize, operator: String },

    #[error("condition {index}: only one of value or ref may be given")]
    ConflictingOperand { index: usize },

    #[error("condition {index}: invalid value: {reason}")]
    InvalidLiteral { index: usize, reason: String },

    #[error("action {index}: missing type")]
    MissingActionKind { index: usize },

    #[error("action {index}: unknown action type '{kind}'{}", did_you_mean(.suggestion))]
    UnknownActionKind {
        index: usize,
        kind: String,
        suggestion: Option<&'static str>,
    },

    #[error("action {index}: invalid severity '{severity}' (expected low, medium or high)")]
    InvalidSeverity { index: usize, severity: String },

    #[error("action {index}: missing message")]
    MissingMessage { index: usize },
}
