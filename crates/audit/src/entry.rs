//! Audit entry records, append requests, and the external export view.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Network/client metadata captured with an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A persisted, signed audit entry.
///
/// `signature` is a pure function of every other field as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing sequence number.
    pub id: u64,
    pub user_id: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientMetadata,
    pub signature: String,
}

/// Fields supplied by the caller when appending an entry.
///
/// The logger assigns the sequence number, timestamp, and signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditRecord {
    pub user_id: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub client: ClientMetadata,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target_type: target_type.into(),
            ..Self::default()
        }
    }

    pub fn actor(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the actor only when one is known.
    pub fn maybe_actor(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn client(mut self, client: ClientMetadata) -> Self {
        self.client = client;
        self
    }
}

/// Minimised view released to external auditors.
///
/// Only these four fields exist on the type, so actor identity, target id,
/// and detail payload cannot leak through serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedAuditEntry {
    pub id: u64,
    pub action: String,
    pub target_type: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&AuditEntry> for ExportedAuditEntry {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action.clone(),
            target_type: entry.target_type.clone(),
            timestamp: entry.timestamp,
        }
    }
}

/// Inclusive timestamp range; an open bound matches everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |f| ts >= f) && self.to.map_or(true, |t| ts <= t)
    }
}

/// Truncate a timestamp to microseconds so it survives storage backends
/// that do not keep nanoseconds; the signed value must equal the stored one.
pub(crate) fn storage_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(ts)
}
