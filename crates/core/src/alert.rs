//! Alerts raised by rule actions and their lifecycle.
//!
//! An alert moves along one of two paths:
//!
//! ```text
//! pending --acknowledge--> acknowledged --resolve--> resolved
//! pending --dismiss------> dismissed
//! ```
//!
//! `resolved` and `dismissed` are terminal. Every other move is rejected with
//! [`CoreError::InvalidTransition`], including `acknowledged -> dismissed`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::evidence::{CaseId, EvidenceId};

/// Alert severity as declared by the rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Dismissed)
    }

    /// Open alerts still need attention (pending or acknowledged).
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Pending => write!(f, "pending"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTransition {
    Acknowledge,
    Resolve,
    Dismiss,
}

impl AlertTransition {
    /// Target status if the transition is permitted from `from`.
    pub fn apply(self, from: AlertStatus) -> Option<AlertStatus> {
        match (from, self) {
            (AlertStatus::Pending, AlertTransition::Acknowledge) => Some(AlertStatus::Acknowledged),
            (AlertStatus::Acknowledged, AlertTransition::Resolve) => Some(AlertStatus::Resolved),
            (AlertStatus::Pending, AlertTransition::Dismiss) => Some(AlertStatus::Dismissed),
            _ => None,
        }
    }
}

impl fmt::Display for AlertTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertTransition::Acknowledge => write!(f, "acknowledge"),
            AlertTransition::Resolve => write!(f, "resolve"),
            AlertTransition::Dismiss => write!(f, "dismiss"),
        }
    }
}

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub case_id: CaseId,
    pub rule_id: String,
    /// Evidence item whose evaluation raised the alert.
    pub source_evidence_id: EvidenceId,
    pub severity: Severity,
    pub message: String,
    pub evidence_refs: Vec<EvidenceId>,
    pub created_at: DateTime<Utc>,
    pub status: AlertStatus,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a new pending alert with a fresh id.
    pub fn new(
        case_id: impl Into<CaseId>,
        rule_id: impl Into<String>,
        source_evidence_id: impl Into<EvidenceId>,
        severity: Severity,
        message: impl Into<String>,
        evidence_refs: Vec<EvidenceId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id: case_id.into(),
            rule_id: rule_id.into(),
            source_evidence_id: source_evidence_id.into(),
            severity,
            message: message.into(),
            evidence_refs,
            created_at,
            status: AlertStatus::Pending,
            acknowledged_by: None,
            acknowledged_at: None,
            resolution_notes: None,
            closed_at: None,
        }
    }

    fn advance(&mut self, transition: AlertTransition) -> Result<()> {
        let next = transition
            .apply(self.status)
            .ok_or(CoreError::InvalidTransition {
                from: self.status,
                action: transition,
            })?;
        self.status = next;
        Ok(())
    }

    /// `pending -> acknowledged`; records who acknowledged and when.
    pub fn acknowledge(&mut self, by: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.advance(AlertTransition::Acknowledge)?;
        self.acknowledged_by = Some(by.into());
        self.acknowledged_at = Some(at);
        Ok(())
    }

    /// `acknowledged -> resolved`; records the resolution notes.
    pub fn resolve(&mut self, notes: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.advance(AlertTransition::Resolve)?;
        self.resolution_notes = Some(notes.into());
        self.closed_at = Some(at);
        Ok(())
    }

    /// `pending -> dismissed`.
    pub fn dismiss(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.advance(AlertTransition::Dismiss)?;
        self.closed_at = Some(at);
        Ok(())
    }
}
