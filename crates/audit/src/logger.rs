//! [`AuditLogger`]: signs, appends, verifies, and exports audit entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::canonical::{sign, SignedFields};
use crate::entry::{storage_precision, AuditEntry, AuditRecord, DateRange, ExportedAuditEntry};
use crate::error::{AuditError, Result};
use crate::store::AuditStore;

/// Outcome of re-verifying a set of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub checked: usize,
    /// Ids whose recomputed signature did not match, in sequence order.
    pub corrupted: Vec<u64>,
}

impl VerificationReport {
    pub fn is_intact(&self) -> bool {
        self.corrupted.is_empty()
    }
}

/// Append-only, signed audit logger on top of an [`AuditStore`].
///
/// Sequence numbers are reserved under a mutex so no two appends can claim
/// the same number; signing and the store write happen outside the lock.
/// A failed store write leaves a gap in the sequence, never a duplicate.
///
/// The reserved counter is cached per logger. When another writer on the
/// same store has taken the number, the store rejects it with
/// [`AuditError::DuplicateSequence`]; the logger then re-reads the store's
/// last sequence and retries once.
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    signing_key: Option<Vec<u8>>,
    /// Last reserved sequence number; `None` until first read from the store.
    last_reserved: Mutex<Option<u64>>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            signing_key: None,
            last_reserved: Mutex::new(None),
        }
    }

    /// Mix `key` into every digest produced and checked by this logger.
    pub fn with_signing_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.signing_key = Some(key.as_ref().to_vec());
        self
    }

    /// Append a new entry stamped with the current time.
    pub async fn append(&self, record: AuditRecord) -> Result<AuditEntry> {
        self.append_at(record, Utc::now()).await
    }

    /// Append a new entry with an explicit timestamp.
    ///
    /// The timestamp is truncated to storage precision before signing, so the
    /// signed material is exactly what gets persisted.
    pub async fn append_at(&self, record: AuditRecord, at: DateTime<Utc>) -> Result<AuditEntry> {
        // Absent and null details sign identically; store one representation.
        let details = record.details.filter(|d| !d.is_null());

        let mut entry = AuditEntry {
            id: self.reserve_sequence().await?,
            user_id: record.user_id,
            action: record.action,
            target_type: record.target_type,
            target_id: record.target_id,
            details,
            timestamp: storage_precision(at),
            client: record.client,
            signature: String::new(),
        };
        entry.signature = self.signature_of(&entry);

        match self.store.insert(entry.clone()).await {
            Err(AuditError::DuplicateSequence(taken)) => {
                debug!(taken, "sequence number taken by another writer, resyncing");
                *self.last_reserved.lock().await = None;
                entry.id = self.reserve_sequence().await?;
                entry.signature = self.signature_of(&entry);
                self.store.insert(entry.clone()).await?;
            }
            other => other?,
        }
        debug!(id = entry.id, action = %entry.action, target_type = %entry.target_type, "audit entry appended");
        Ok(entry)
    }

    async fn reserve_sequence(&self) -> Result<u64> {
        let mut guard = self.last_reserved.lock().await;
        let last = match *guard {
            Some(last) => last,
            None => self.store.last_sequence().await?,
        };
        let next = last + 1;
        *guard = Some(next);
        Ok(next)
    }

    fn signature_of(&self, entry: &AuditEntry) -> String {
        sign(&SignedFields::from(entry), self.signing_key.as_deref())
    }

    /// Whether an entry's stored signature matches its stored fields.
    pub fn is_authentic(&self, entry: &AuditEntry) -> bool {
        self.signature_of(entry) == entry.signature
    }

    /// Re-fetch an entry and recompute its signature.
    ///
    /// Returns `Ok(false)` for a mismatch; a missing entry is an error.
    pub async fn verify(&self, id: u64) -> Result<bool> {
        let entry = self.store.get(id).await?.ok_or(AuditError::NotFound(id))?;
        let ok = self.is_authentic(&entry);
        if !ok {
            warn!(id, action = %entry.action, "audit entry is not verifiable");
        }
        Ok(ok)
    }

    /// Fetch an entry, failing with [`AuditError::Integrity`] if it does not verify.
    pub async fn require_verified(&self, id: u64) -> Result<AuditEntry> {
        let entry = self.store.get(id).await?.ok_or(AuditError::NotFound(id))?;
        if self.is_authentic(&entry) {
            Ok(entry)
        } else {
            warn!(id, action = %entry.action, "audit entry is not verifiable");
            Err(AuditError::Integrity { id })
        }
    }

    /// Re-verify every stored entry. Corrupted entries are reported, never removed.
    pub async fn verify_all(&self) -> Result<VerificationReport> {
        let entries = self.store.list(&DateRange::unbounded()).await?;
        let mut report = VerificationReport {
            checked: entries.len(),
            corrupted: Vec::new(),
        };
        for entry in &entries {
            if !self.is_authentic(entry) {
                warn!(id = entry.id, action = %entry.action, "audit entry is not verifiable");
                report.corrupted.push(entry.id);
            }
        }
        Ok(report)
    }

    /// Entries in `range`, in sequence order.
    pub async fn entries(&self, range: DateRange) -> Result<Vec<AuditEntry>> {
        self.store.list(&range).await
    }

    /// Minimised export for external auditors.
    ///
    /// Actor identity, target id, detail payload, and client metadata are
    /// always stripped; the optional filter only narrows by target type.
    pub async fn export_for_external_auditor(
        &self,
        range: DateRange,
        target_type: Option<&str>,
    ) -> Result<Vec<ExportedAuditEntry>> {
        let entries = self.store.list(&range).await?;
        Ok(entries
            .iter()
            .filter(|e| target_type.map_or(true, |t| e.target_type == t))
            .map(ExportedAuditEntry::from)
            .collect())
    }
}
