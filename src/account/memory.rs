//! In-memory execution layer
//!
//! Simulates the on-chain side of multisig accounts: signer sets, thresholds,
//! nonces and atomic execution. Used by tests and local dry runs.

use crate::account::rules::{evaluate, packed_signatures};
use crate::account::{
    AccountError, AccountState, ExecutionError, ExecutionReceipt, MultisigAccountView, Validity,
};
use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::{keccak256_concat, ShortHex, TxHash};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// A transaction the ledger executed
#[derive(Clone, Debug)]
pub struct ExecutedTransaction {
    pub receipt: ExecutionReceipt,
    /// Signatures as submitted, ascending by signer
    pub signatures: Vec<u8>,
}

#[derive(Debug)]
struct AccountEntry {
    state: AccountState,
    executed: Vec<ExecutedTransaction>,
}

/// Simulated execution layer holding any number of accounts
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<Address, AccountEntry>>,
    /// Calls that fail before touching state
    failures: AtomicUsize,
    /// Executions that apply but whose acknowledgement is lost
    lost_acks: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new account
    pub async fn register(&self, account: Address, state: AccountState) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&account) {
            return Err(AccountError::AccountExists(account));
        }
        log::debug!(
            "Registered account {} ({}-of-{}, nonce {})",
            account,
            state.threshold,
            state.signer_count(),
            state.nonce
        );
        accounts.insert(
            account,
            AccountEntry {
                state,
                executed: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add a signer, optionally changing the threshold
    pub async fn add_signer(
        &self,
        account: &Address,
        signer: Address,
        threshold: Option<u32>,
    ) -> Result<(), AccountError> {
        self.update(account, |state| {
            if !state.signers.insert(signer) {
                return Err(AccountError::DuplicateSigner(signer));
            }
            if let Some(threshold) = threshold {
                state.threshold = threshold;
            }
            Ok(())
        })
        .await
    }

    /// Remove a signer; the threshold is lowered if it would exceed the signer count
    pub async fn remove_signer(&self, account: &Address, signer: &Address) -> Result<(), AccountError> {
        self.update(account, |state| {
            if !state.signers.remove(signer) {
                return Err(AccountError::UnknownSigner(*signer));
            }
            if state.signers.is_empty() {
                return Err(AccountError::NoSigners);
            }
            let count = state.signers.len() as u32;
            if state.threshold > count {
                state.threshold = count;
            }
            Ok(())
        })
        .await
    }

    pub async fn set_threshold(&self, account: &Address, threshold: u32) -> Result<(), AccountError> {
        self.update(account, |state| {
            state.threshold = threshold;
            Ok(())
        })
        .await
    }

    /// Transactions executed on an account, oldest first
    pub async fn executed(&self, account: &Address) -> Vec<ExecutedTransaction> {
        self.accounts
            .lock()
            .await
            .get(account)
            .map(|entry| entry.executed.clone())
            .unwrap_or_default()
    }

    /// Make the next `n` calls fail with [`ExecutionError::Unavailable`]
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Apply the next `n` executions but report them as unavailable
    pub fn lose_next_acks(&self, n: usize) {
        self.lost_acks.store(n, Ordering::SeqCst);
    }

    /// Apply `change` to a copy of the state and keep it only if it stays valid
    async fn update<F>(&self, account: &Address, change: F) -> Result<(), AccountError>
    where
        F: FnOnce(&mut AccountState) -> Result<(), AccountError>,
    {
        let mut accounts = self.accounts.lock().await;
        let entry = accounts
            .get_mut(account)
            .ok_or(AccountError::UnknownAccount(*account))?;

        let mut next = entry.state.clone();
        change(&mut next)?;
        next.check_threshold()?;
        entry.state = next;
        Ok(())
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected_failure(&self) -> Result<(), ExecutionError> {
        if Self::take_failure(&self.failures) {
            return Err(ExecutionError::Unavailable(
                "execution layer unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Safe-style revert reason for a rejected execution
fn revert_reason(validity: &Validity) -> String {
    match validity {
        Validity::Valid => "GS013: Safe transaction failed".to_string(),
        Validity::StaleNonce { .. } | Validity::FutureNonce { .. } => {
            "GS026: Invalid owner provided".to_string()
        }
        Validity::InsufficientEndorsements { .. } => {
            "GS020: Signatures data too short".to_string()
        }
    }
}

#[async_trait]
impl MultisigAccountView for InMemoryLedger {
    async fn current_state(&self, account: &Address) -> Result<AccountState, ExecutionError> {
        self.injected_failure()?;
        self.accounts
            .lock()
            .await
            .get(account)
            .map(|entry| entry.state.clone())
            .ok_or(ExecutionError::UnknownAccount(*account))
    }

    async fn execute(
        &self,
        proposal: &TransactionProposal,
        endorsements: &[Endorsement],
    ) -> Result<ExecutionReceipt, ExecutionError> {
        self.injected_failure()?;

        let mut accounts = self.accounts.lock().await;
        let entry = accounts
            .get_mut(&proposal.account)
            .ok_or(ExecutionError::UnknownAccount(proposal.account))?;

        // The hash binds every field, so a tampered proposal fails recovery
        if !proposal.verify_hash() {
            return Err(ExecutionError::Reverted(
                "GS026: Invalid owner provided".to_string(),
            ));
        }

        let validity = evaluate(&entry.state, proposal, endorsements);
        if !validity.is_valid() {
            log::debug!("Ledger rejected {}: {}", proposal.hash.short(), validity);
            return Err(ExecutionError::Reverted(revert_reason(&validity)));
        }

        let signatures = packed_signatures(&entry.state, proposal, endorsements);
        let nonce = entry.state.nonce;
        entry.state.nonce += 1;

        let receipt_id = keccak256_concat(&[
            proposal.account.as_slice(),
            proposal.hash.as_slice(),
            &nonce.to_be_bytes(),
        ])
        .to_string();
        let receipt = ExecutionReceipt {
            receipt_id,
            proposal_hash: proposal.hash,
            account: proposal.account,
            nonce,
            executed_at: Utc::now(),
        };
        entry.executed.push(ExecutedTransaction {
            receipt: receipt.clone(),
            signatures,
        });

        log::debug!(
            "Ledger executed {} on {} at nonce {}",
            proposal.hash.short(),
            proposal.account,
            nonce
        );

        if Self::take_failure(&self.lost_acks) {
            return Err(ExecutionError::Unavailable(
                "connection dropped before receipt".to_string(),
            ));
        }
        Ok(receipt)
    }

    async fn find_execution(
        &self,
        account: &Address,
        hash: &TxHash,
    ) -> Result<Option<ExecutionReceipt>, ExecutionError> {
        self.injected_failure()?;
        let accounts = self.accounts.lock().await;
        let entry = accounts
            .get(account)
            .ok_or(ExecutionError::UnknownAccount(*account))?;
        Ok(entry
            .executed
            .iter()
            .find(|tx| tx.receipt.proposal_hash == *hash)
            .map(|tx| tx.receipt.clone()))
    }
}
