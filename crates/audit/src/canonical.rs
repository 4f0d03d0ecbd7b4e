//! Canonical serialization and signature computation for audit entries.
//!
//! The canonical form is compact JSON with:
//! - object keys sorted bytewise at every nesting level
//! - absent optional fields written as `null` (absent and null are the same)
//! - timestamps as RFC 3339 UTC with exactly six fractional digits
//! - the `signature` field excluded
//!
//! Any tool that reproduces these rules can verify an exported entry
//! independently of this crate.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::entry::AuditEntry;

/// Prefix mixed into every digest so signatures of other record types never collide.
const DOMAIN_TAG: &[u8] = b"custos-audit-v1\n";

/// Borrowed view of every signed field of an entry.
pub struct SignedFields<'a> {
    pub id: u64,
    pub user_id: Option<&'a str>,
    pub action: &'a str,
    pub target_type: &'a str,
    pub target_id: Option<&'a str>,
    pub details: Option<&'a serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

impl<'a> From<&'a AuditEntry> for SignedFields<'a> {
    fn from(e: &'a AuditEntry) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id.as_deref(),
            action: &e.action,
            target_type: &e.target_type,
            target_id: e.target_id.as_deref(),
            details: e.details.as_ref(),
            timestamp: e.timestamp,
            ip_address: e.client.ip_address.as_deref(),
            user_agent: e.client.user_agent.as_deref(),
        }
    }
}

/// Render the canonical byte string for a set of signed fields.
pub fn canonicalize(fields: &SignedFields<'_>) -> String {
    // Keys are written in sorted order by hand.
    let mut out = String::with_capacity(256);
    out.push('{');
    write_key(&mut out, "action", true);
    write_str(&mut out, fields.action);
    write_key(&mut out, "details", false);
    match fields.details {
        Some(v) => write_value(&mut out, v),
        None => out.push_str("null"),
    }
    write_key(&mut out, "id", false);
    out.push_str(&fields.id.to_string());
    write_key(&mut out, "ip_address", false);
    write_opt_str(&mut out, fields.ip_address);
    write_key(&mut out, "target_id", false);
    write_opt_str(&mut out, fields.target_id);
    write_key(&mut out, "target_type", false);
    write_str(&mut out, fields.target_type);
    write_key(&mut out, "timestamp", false);
    write_str(&mut out, &canonical_timestamp(fields.timestamp));
    write_key(&mut out, "user_agent", false);
    write_opt_str(&mut out, fields.user_agent);
    write_key(&mut out, "user_id", false);
    write_opt_str(&mut out, fields.user_id);
    out.push('}');
    out
}

pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Compute the hex signature for the given fields.
///
/// Without a key this is `SHA-256(tag || canonical)`. With a key it is the
/// nested construction `SHA-256(key || SHA-256(key || tag || canonical))`,
/// which keeps the digest from being recomputed by anyone without the key.
pub fn sign(fields: &SignedFields<'_>, key: Option<&[u8]>) -> String {
    let canonical = canonicalize(fields);
    let digest = match key {
        None => {
            let mut hasher = Sha256::new();
            hasher.update(DOMAIN_TAG);
            hasher.update(canonical.as_bytes());
            hasher.finalize()
        }
        Some(key) => {
            let mut inner = Sha256::new();
            inner.update(key);
            inner.update(DOMAIN_TAG);
            inner.update(canonical.as_bytes());
            let inner = inner.finalize();

            let mut outer = Sha256::new();
            outer.update(key);
            outer.update(inner);
            outer.finalize()
        }
    };
    format!("{:x}", digest)
}

// ── JSON writers ────────────────────────────────────────────────────

fn write_key(out: &mut String, key: &str, first: bool) {
    if !first {
        out.push(',');
    }
    write_str(out, key);
    out.push(':');
}

fn write_str(out: &mut String, s: &str) {
    // serde_json string escaping is deterministic for a given input.
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("null"),
    }
}

fn write_opt_str(out: &mut String, s: Option<&str>) {
    match s {
        Some(s) => write_str(out, s),
        None => out.push_str("null"),
    }
}

fn write_value(out: &mut String, value: &serde_json::Value) {
    use serde_json::Value;
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                write_key(out, key, i == 0);
                write_value(out, &map[key]);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields<'a>(details: Option<&'a serde_json::Value>) -> SignedFields<'a> {
        SignedFields {
            id: 7,
            user_id: Some("user-1"),
            action: "evidence.uploaded",
            target_type: "evidence",
            target_id: Some("ev-9"),
            details,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn canonical_form_is_sorted_and_explicit() {
        let details = json!({"b": 1, "a": {"z": true, "y": null}});
        let canonical = canonicalize(&fields(Some(&details)));
        assert_eq!(
            canonical,
            r#"{"action":"evidence.uploaded","details":{"a":{"y":null,"z":true},"b":1},"id":7,"ip_address":null,"target_id":"ev-9","target_type":"evidence","timestamp":"2024-03-01T12:00:00.000000Z","user_agent":null,"user_id":"user-1"}"#
        );
    }

    #[test]
    fn key_order_in_details_does_not_change_signature() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": [1, 2]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y": [1, 2], "x": 1}"#).unwrap();
        assert_eq!(sign(&fields(Some(&a)), None), sign(&fields(Some(&b)), None));
    }

    #[test]
    fn signature_changes_with_any_field() {
        let base = sign(&fields(None), None);
        let mut altered = fields(None);
        altered.target_type = "case";
        assert_ne!(base, sign(&altered, None));

        let mut altered = fields(None);
        altered.timestamp = altered.timestamp + chrono::TimeDelta::microseconds(1);
        assert_ne!(base, sign(&altered, None));

        let mut altered = fields(None);
        altered.id = 8;
        assert_ne!(base, sign(&altered, None));
    }

    #[test]
    fn keyed_signature_differs_from_unkeyed() {
        let unkeyed = sign(&fields(None), None);
        let keyed = sign(&fields(None), Some(b"secret"));
        let other_key = sign(&fields(None), Some(b"other"));
        assert_eq!(unkeyed.len(), 64);
        assert_ne!(unkeyed, keyed);
        assert_ne!(keyed, other_key);
    }
}
