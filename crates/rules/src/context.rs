//! Fact context: the per-evaluation snapshot rules are checked against.
//!
//! Layout:
//!
//! ```text
//! now                          timestamp of the evaluation
//! evidence.id / case_id / type / timestamp / location
//! evidence.attributes.*        free-form attributes from the snapshot
//! evidence.chain_of_custody    sequence of {timestamp, custodian, action, location, notes}
//! evidence.custody.has_gap / gap_count / max_gap_hours / entry_count
//! case.id / case_number / status / created_at
//! ```
//!
//! A context is built fresh for every evaluated evidence item and is never
//! mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use custos_core::{CaseSnapshot, CustodyEntry, EvidenceSnapshot};

use crate::custody::ChainOfCustodyAnalyzer;
use crate::value::Value;

// ── Field paths ─────────────────────────────────────────────────────

/// A dot-separated path into the fact context, e.g. `evidence.custody.has_gap`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for FieldPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("field path is empty".to_string());
        }
        let segments: Vec<String> = trimmed.split('.').map(|seg| seg.trim().to_string()).collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(format!("field path '{}' has an empty segment", trimmed));
        }
        Ok(FieldPath(segments))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

// ── Fact context ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FactContext {
    root: Value,
    now: DateTime<Utc>,
}

impl FactContext {
    /// Build the context for one evidence item and its (optional) owning case.
    pub fn build(
        evidence: &EvidenceSnapshot,
        case: Option<&CaseSnapshot>,
        now: DateTime<Utc>,
        custody: &ChainOfCustodyAnalyzer,
    ) -> Self {
        let mut root = BTreeMap::new();
        root.insert("now".to_string(), Value::Timestamp(now));
        root.insert("evidence".to_string(), evidence_facts(evidence, custody));
        if let Some(case) = case {
            root.insert("case".to_string(), case_facts(case));
        }
        Self {
            root: Value::Map(root),
            now,
        }
    }

    /// Build a context from an arbitrary root map. `now` is inserted if missing.
    pub fn from_map(mut root: BTreeMap<String, Value>, now: DateTime<Utc>) -> Self {
        root.entry("now".to_string()).or_insert(Value::Timestamp(now));
        Self {
            root: Value::Map(root),
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Walk `path` segment by segment. Missing segments resolve to [`Value::Absent`].
    pub fn resolve(&self, path: &FieldPath) -> &Value {
        path.segments()
            .iter()
            .fold(&self.root, |current, segment| current.child(segment))
    }

    /// Resolve a dotted path given as a string; invalid paths are absent.
    pub fn lookup(&self, path: &str) -> &Value {
        match path.parse::<FieldPath>() {
            Ok(p) => self.resolve(&p),
            Err(_) => &crate::value::ABSENT,
        }
    }
}

fn evidence_facts(evidence: &EvidenceSnapshot, custody: &ChainOfCustodyAnalyzer) -> Value {
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), Value::from(evidence.id.as_str()));
    map.insert("case_id".to_string(), Value::from(evidence.case_id.as_str()));
    map.insert("type".to_string(), Value::from(evidence.evidence_type.as_str()));
    map.insert("timestamp".to_string(), Value::from(evidence.timestamp));
    map.insert("location".to_string(), Value::from(evidence.location.clone()));
    map.insert(
        "attributes".to_string(),
        Value::Map(
            evidence
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v)))
                .collect(),
        ),
    );
    map.insert(
        "chain_of_custody".to_string(),
        Value::Sequence(evidence.chain_of_custody.iter().map(custody_entry_facts).collect()),
    );

    let summary = custody.summarize(&evidence.chain_of_custody);
    let mut custody_map = BTreeMap::new();
    custody_map.insert("has_gap".to_string(), Value::Bool(summary.has_gap()));
    custody_map.insert("gap_count".to_string(), Value::Number(summary.gap_count as f64));
    custody_map.insert("entry_count".to_string(), Value::Number(summary.entry_count as f64));
    custody_map.insert("max_gap_hours".to_string(), Value::from(summary.max_interval_hours()));
    map.insert("custody".to_string(), Value::Map(custody_map));

    Value::Map(map)
}

fn custody_entry_facts(entry: &CustodyEntry) -> Value {
    let mut map = BTreeMap::new();
    map.insert("timestamp".to_string(), Value::Timestamp(entry.timestamp));
    map.insert("custodian".to_string(), Value::from(entry.custodian.as_str()));
    map.insert("action".to_string(), Value::from(entry.action.to_string()));
    map.insert("location".to_string(), Value::from(entry.location.clone()));
    map.insert("notes".to_string(), Value::from(entry.notes.clone()));
    Value::Map(map)
}

fn case_facts(case: &CaseSnapshot) -> Value {
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), Value::from(case.id.as_str()));
    map.insert("case_number".to_string(), Value::from(case.case_number.as_str()));
    map.insert("status".to_string(), Value::from(case.status.as_str()));
    map.insert("created_at".to_string(), Value::Timestamp(case.created_at));
    Value::Map(map)
}
