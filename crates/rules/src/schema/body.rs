//! Serde view of the versioned rule text.
//!
//! Every field is optional. Presence and shape are checked by the compiler,
//! which maps each problem to a specific
//! [`CompilationError`](crate::compiler::CompilationError). Unknown keys are
//! rejected at parse time.

use serde::Deserialize;

/// Top-level rule text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RuleBody {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Option<Vec<ConditionBody>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionBody>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConditionBody {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    /// Literal comparison value.
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
    /// Compare against another context path instead of a literal.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ActionBody {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub evidence_refs: Option<Vec<String>>,
}
