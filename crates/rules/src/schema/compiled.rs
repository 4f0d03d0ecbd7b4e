//! Compiled, validated rule form.

use std::fmt;
use std::str::FromStr;

use custos_core::Severity;

use crate::context::FieldPath;
use crate::value::Value;

/// Supported rule text schema versions.
pub const SUPPORTED_VERSIONS: &[&str] = &["v1"];

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::Exists,
        Operator::NotExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
        }
    }

    /// Whether the operator compares against a value or reference.
    pub fn takes_operand(&self) -> bool {
        !matches!(self, Operator::Exists | Operator::NotExists)
    }

    pub(crate) fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Operator::as_str).collect()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    /// Exact names only; there is no fallback operator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operator: '{}'", s))
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `exists` / `not_exists`.
    None,
    Literal(Value),
    /// Another path in the same fact context, e.g. `now`.
    Field(FieldPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: FieldPath,
    pub operator: Operator,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateAlert,
}

impl ActionKind {
    pub const ALL: [ActionKind; 1] = [ActionKind::CreateAlert];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateAlert => "create_alert",
        }
    }

    pub(crate) fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(ActionKind::as_str).collect()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown action type: '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub severity: Severity,
    /// Message with `{{path}}` placeholders, interpolated at execution time.
    pub message: String,
    /// Explicit evidence references; empty means "the triggering item".
    pub evidence_refs: Vec<String>,
}

/// In-memory view of a [`RuleDefinition`](super::RuleDefinition) that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub rule_id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}
