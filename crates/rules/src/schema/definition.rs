//! Persisted rule definition records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, declarative rule authored by a rule owner.
///
/// `definition` holds the versioned rule text (YAML or JSON) that the
/// [`RuleCompiler`](crate::compiler::RuleCompiler) turns into a
/// [`CompiledRule`](super::CompiledRule). Removal is by deactivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: String,
    pub owner: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RuleDefinition {
    /// New active definition stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            definition: definition.into(),
            owner: owner.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

fn default_true() -> bool {
    true
}
