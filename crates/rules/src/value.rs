//! Tagged value type for fact lookups and rule literals.
//!
//! Every field resolved from a [`FactContext`](crate::context::FactContext)
//! and every literal in a compiled condition is a [`Value`]. Operators match
//! on the variants explicitly, so there is no implicit coercion between
//! strings and numbers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// A resolved fact or literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The path did not resolve to anything.
    Absent,
    /// The path resolved to an explicit null.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Shared sentinel returned for unresolved lookups.
pub(crate) static ABSENT: Value = Value::Absent;

impl Value {
    /// Present means neither missing nor null.
    pub fn is_present(&self) -> bool {
        !matches!(self, Value::Absent | Value::Null)
    }

    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
        }
    }

    /// Look up one path segment: a key for maps, an index for sequences.
    pub fn child(&self, segment: &str) -> &Value {
        match self {
            Value::Map(map) => map.get(segment).unwrap_or(&ABSENT),
            Value::Sequence(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .unwrap_or(&ABSENT),
            _ => &ABSENT,
        }
    }

    /// Type-sensitive equality.
    ///
    /// Values of different variants are never equal, with one exception:
    /// a timestamp equals a string that parses as the same RFC 3339 instant.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Absent, _) | (_, Value::Absent) => false,
            (Value::Timestamp(t), Value::String(s)) | (Value::String(s), Value::Timestamp(t)) => {
                parse_timestamp(s).is_some_and(|p| p == *t)
            }
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.equals(vb))
            }
            _ => self == other,
        }
    }

    /// Numeric or temporal ordering; `None` when the pair is not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::String(s)) => parse_timestamp(s).map(|b| a.cmp(&b)),
            (Value::String(s), Value::Timestamp(b)) => parse_timestamp(s).map(|a| a.cmp(b)),
            _ => None,
        }
    }

    /// Human-readable rendering for message templates and substring tests.
    ///
    /// Returns `None` for absent and null values.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Absent | Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(render_number(*n)),
            Value::String(s) => Some(s.clone()),
            Value::Timestamp(t) => Some(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Value::Sequence(items) => Some(
                items
                    .iter()
                    .filter_map(Value::render)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Map(_) => Some(self.to_json().to_string()),
        }
    }

    /// Convert back to JSON (timestamps become RFC 3339 strings, absent becomes null).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Absent | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert a YAML literal from rule text.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Value, String> {
        use serde_yaml::Value as Y;
        match value {
            Y::Null => Ok(Value::Null),
            Y::Bool(b) => Ok(Value::Bool(*b)),
            Y::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| format!("number {} is not representable", n)),
            Y::String(s) => Ok(Value::String(s.clone())),
            Y::Sequence(items) => items
                .iter()
                .map(Value::from_yaml)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Y::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (k, v) in mapping {
                    let key = k
                        .as_str()
                        .ok_or_else(|| "mapping keys must be strings".to_string())?;
                    map.insert(key.to_string(), Value::from_yaml(v)?);
                }
                Ok(Value::Map(map))
            }
            Y::Tagged(_) => Err("tagged YAML values are not supported".to_string()),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Sequence(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Integral numbers render without a trailing `.0`.
fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
