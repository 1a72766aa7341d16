//! In-memory relay
//!
//! Keeps records in a map keyed by proposal hash and applies the same checks a
//! hosted relay does: the hash must match the proposal fields and every
//! signature must recover to its declared signer.

use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::{ShortHex, TxHash};
use crate::relay::{ProposalRecord, RecordOutcome, RecordStatus, RelayClient, RelayError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Relay store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryRelay {
    records: RwLock<HashMap<TxHash, ProposalRecord>>,
    failures: AtomicUsize,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail with [`RelayError::Unavailable`]
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Store a record as-is, skipping every check
    pub async fn seed(&self, record: ProposalRecord) {
        self.records.write().await.insert(record.hash(), record);
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    fn injected_failure(&self) -> Result<(), RelayError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RelayError::Unavailable("relay unreachable".to_string()));
        }
        Ok(())
    }
}

fn check_authentic(endorsement: &Endorsement) -> Result<(), RelayError> {
    if !endorsement.is_authentic() {
        return Err(RelayError::Rejected(format!(
            "signature does not recover to {}",
            endorsement.signer
        )));
    }
    Ok(())
}

#[async_trait]
impl RelayClient for InMemoryRelay {
    async fn propose(
        &self,
        proposal: &TransactionProposal,
        endorsement: &Endorsement,
    ) -> Result<TxHash, RelayError> {
        self.injected_failure()?;

        if !proposal.verify_hash() {
            return Err(RelayError::Rejected(format!(
                "hash {} does not match proposal fields",
                proposal.hash.short()
            )));
        }
        if endorsement.proposal_hash != proposal.hash {
            return Err(RelayError::Rejected(
                "initial endorsement is for another proposal".to_string(),
            ));
        }
        check_authentic(endorsement)?;

        let mut records = self.records.write().await;
        if let Some(existing) = records.get_mut(&proposal.hash) {
            if existing.proposal != *proposal {
                return Err(RelayError::Conflict(proposal.hash));
            }
            existing.add_endorsement(endorsement.clone())?;
            log::debug!("Relay already holds {}", proposal.hash.short());
            return Ok(proposal.hash);
        }

        records.insert(
            proposal.hash,
            ProposalRecord::new(proposal.clone(), endorsement.clone()),
        );
        log::debug!(
            "Relay stored {} for {} at nonce {}",
            proposal.hash.short(),
            proposal.account,
            proposal.nonce
        );
        Ok(proposal.hash)
    }

    async fn fetch(&self, hash: &TxHash) -> Result<ProposalRecord, RelayError> {
        self.injected_failure()?;
        self.records
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or(RelayError::UnknownProposal(*hash))
    }

    async fn confirm(&self, hash: &TxHash, endorsement: &Endorsement) -> Result<(), RelayError> {
        self.injected_failure()?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(hash)
            .ok_or(RelayError::UnknownProposal(*hash))?;

        if !record.is_pending() {
            return Err(RelayError::Rejected(format!(
                "{} is no longer pending",
                hash.short()
            )));
        }
        check_authentic(endorsement)?;

        if record.add_endorsement(endorsement.clone())? {
            log::debug!(
                "Relay recorded endorsement {} of {} for {}",
                record.endorsements.len(),
                endorsement.signer,
                hash.short()
            );
        }
        Ok(())
    }

    async fn list_pending(&self, account: &Address) -> Result<Vec<ProposalRecord>, RelayError> {
        self.injected_failure()?;

        let mut pending: Vec<ProposalRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.proposal.account == *account && r.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.proposal
                .nonce
                .cmp(&b.proposal.nonce)
                .then(a.submitted_at.cmp(&b.submitted_at))
        });
        Ok(pending)
    }

    async fn record_outcome(&self, hash: &TxHash, outcome: RecordOutcome) -> Result<(), RelayError> {
        self.injected_failure()?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(hash)
            .ok_or(RelayError::UnknownProposal(*hash))?;

        // An execution is final; later failures do not overwrite it
        if matches!(record.status, RecordStatus::Executed { .. }) {
            return Ok(());
        }
        record.status = outcome.into();
        record.updated_at = Utc::now();
        Ok(())
    }
}
