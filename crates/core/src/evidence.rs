use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque evidence item identifier.
pub type EvidenceId = String;

/// Opaque case identifier.
pub type CaseId = String;

/// Kind of handling recorded in a chain-of-custody entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustodyAction {
    Collected,
    Transferred,
    Analyzed,
    Stored,
    Returned,
}

impl std::fmt::Display for CustodyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustodyAction::Collected => write!(f, "collected"),
            CustodyAction::Transferred => write!(f, "transferred"),
            CustodyAction::Analyzed => write!(f, "analyzed"),
            CustodyAction::Stored => write!(f, "stored"),
            CustodyAction::Returned => write!(f, "returned"),
        }
    }
}

/// One observation in an evidence item's chain of custody.
///
/// Entries are immutable once recorded; a correction is appended as a new
/// entry rather than edited in place, so there are no setters here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub timestamp: DateTime<Utc>,
    pub custodian: String,
    pub action: CustodyAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CustodyEntry {
    pub fn new(timestamp: DateTime<Utc>, custodian: impl Into<String>, action: CustodyAction) -> Self {
        Self {
            timestamp,
            custodian: custodian.into(),
            action,
            location: None,
            notes: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Point-in-time view of an evidence item, supplied by the evidence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub id: EvidenceId,
    pub case_id: CaseId,
    #[serde(rename = "type")]
    pub evidence_type: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub chain_of_custody: Vec<CustodyEntry>,
    /// Free-form extra fields (e.g. upload metadata) exposed to rules as-is.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Point-in-time view of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub id: CaseId,
    pub case_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custody_action_serializes_lowercase() {
        let json = serde_json::to_string(&CustodyAction::Transferred).unwrap();
        assert_eq!(json, "\"transferred\"");
        assert_eq!(CustodyAction::Analyzed.to_string(), "analyzed");
    }

    #[test]
    fn evidence_snapshot_defaults_optional_fields() {
        let snapshot: EvidenceSnapshot = serde_json::from_str(
            r#"{"id": "ev-1", "case_id": "case-1", "type": "photo"}"#,
        )
        .unwrap();
        assert_eq!(snapshot.evidence_type, "photo");
        assert!(snapshot.timestamp.is_none());
        assert!(snapshot.chain_of_custody.is_empty());
        assert!(snapshot.attributes.is_empty());
    }

    #[test]
    fn custody_entry_builder() {
        let entry = CustodyEntry::new(Utc::now(), "officer-12", CustodyAction::Collected)
            .with_location("Locker 4")
            .with_notes("sealed bag");
        assert_eq!(entry.location.as_deref(), Some("Locker 4"));
        assert_eq!(entry.notes.as_deref(), Some("sealed bag"));
    }
}
