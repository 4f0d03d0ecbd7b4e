//! Evidence and case snapshot collaborators.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use custos_core::{CaseId, CaseSnapshot, EvidenceId, EvidenceSnapshot};

use crate::store::StoreError;

/// Supplies evidence and case snapshots to the engine.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn evidence(&self, id: &str) -> Result<Option<EvidenceSnapshot>, StoreError>;

    async fn case(&self, id: &str) -> Result<Option<CaseSnapshot>, StoreError>;

    /// Every evidence item of a case, in the order it was added to the case.
    async fn evidence_for_case(&self, case_id: &str) -> Result<Vec<EvidenceSnapshot>, StoreError>;
}

#[derive(Default)]
struct Snapshots {
    cases: HashMap<CaseId, CaseSnapshot>,
    evidence: HashMap<EvidenceId, EvidenceSnapshot>,
    /// Evidence ids per case, in insertion order.
    case_order: HashMap<CaseId, Vec<EvidenceId>>,
}

/// In-memory evidence source, populated by the caller.
#[derive(Default, Clone)]
pub struct InMemoryEvidenceSource {
    inner: Arc<RwLock<Snapshots>>,
}

impl InMemoryEvidenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_case(&self, case: CaseSnapshot) {
        let mut guard = self.inner.write().expect("evidence source lock poisoned");
        guard.cases.insert(case.id.clone(), case);
    }

    /// Insert or replace an evidence snapshot. A replaced item keeps its
    /// position in the case order.
    pub fn put_evidence(&self, evidence: EvidenceSnapshot) {
        let mut guard = self.inner.write().expect("evidence source lock poisoned");
        if let Some(previous) = guard.evidence.get(&evidence.id) {
            if previous.case_id != evidence.case_id {
                let old_case = previous.case_id.clone();
                if let Some(ids) = guard.case_order.get_mut(&old_case) {
                    ids.retain(|id| id != &evidence.id);
                }
            }
        }
        let order = guard.case_order.entry(evidence.case_id.clone()).or_default();
        if !order.contains(&evidence.id) {
            order.push(evidence.id.clone());
        }
        guard.evidence.insert(evidence.id.clone(), evidence);
    }
}

#[async_trait]
impl EvidenceSource for InMemoryEvidenceSource {
    async fn evidence(&self, id: &str) -> Result<Option<EvidenceSnapshot>, StoreError> {
        let guard = self.inner.read().expect("evidence source lock poisoned");
        Ok(guard.evidence.get(id).cloned())
    }

    async fn case(&self, id: &str) -> Result<Option<CaseSnapshot>, StoreError> {
        let guard = self.inner.read().expect("evidence source lock poisoned");
        Ok(guard.cases.get(id).cloned())
    }

    async fn evidence_for_case(&self, case_id: &str) -> Result<Vec<EvidenceSnapshot>, StoreError> {
        let guard = self.inner.read().expect("evidence source lock poisoned");
        Ok(guard
            .case_order
            .get(case_id)
            .map(|ids| ids.iter().filter_map(|id| guard.evidence.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn evidence(id: &str, case_id: &str) -> EvidenceSnapshot {
        EvidenceSnapshot {
            id: id.to_string(),
            case_id: case_id.to_string(),
            evidence_type: "document".to_string(),
            timestamp: Some(Utc::now()),
            location: None,
            chain_of_custody: Vec::new(),
            attributes: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn evidence_for_case_keeps_insertion_order() {
        let source = InMemoryEvidenceSource::new();
        source.put_evidence(evidence("ev-z", "case-1"));
        source.put_evidence(evidence("ev-a", "case-1"));
        source.put_evidence(evidence("ev-m", "case-2"));
        source.put_evidence(evidence("ev-k", "case-1"));
        // Replacing an item does not move it.
        source.put_evidence(evidence("ev-z", "case-1"));

        let ids: Vec<_> = source
            .evidence_for_case("case-1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["ev-z", "ev-a", "ev-k"]);
        assert!(source.evidence_for_case("case-9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moving_evidence_between_cases() {
        let source = InMemoryEvidenceSource::new();
        source.put_evidence(evidence("ev-1", "case-1"));
        source.put_evidence(evidence("ev-1", "case-2"));
        assert!(source.evidence_for_case("case-1").await.unwrap().is_empty());
        assert_eq!(source.evidence_for_case("case-2").await.unwrap().len(), 1);
    }
}
