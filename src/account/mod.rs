//! Multisig account view
//!
//! Read access to a multisig account's signer set, threshold and nonce, the
//! acceptance rule for a proposal plus its endorsements, and execution.
//!
//! # Example
//!
//! ```ignore
//! use multisig_coordinator::account::{AccountState, InMemoryLedger, MultisigAccountView};
//!
//! // Register a 2-of-3 account at nonce 5
//! let ledger = InMemoryLedger::new();
//! ledger.register(account, AccountState::new(vec![a, b, c], 2, 5)?).await?;
//!
//! // Check a proposal and its endorsements
//! let validity = ledger.validate(&proposal, &endorsements).await?;
//! ```

pub mod memory;
pub mod rules;

use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::TxHash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub use memory::InMemoryLedger;
pub use rules::{counted_signers, evaluate, packed_signatures};

/// Errors in account configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Account needs at least one signer")]
    NoSigners,
    #[error("Duplicate signer: {0}")]
    DuplicateSigner(Address),
    #[error("Not a signer: {0}")]
    UnknownSigner(Address),
    #[error("Account not found: {0}")]
    UnknownAccount(Address),
    #[error("Account already registered: {0}")]
    AccountExists(Address),
}

/// Errors from the execution layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The execution layer refused the transaction
    #[error("Execution reverted: {0}")]
    Reverted(String),
    /// The execution layer could not be reached; the call may be retried
    #[error("Execution layer unavailable: {0}")]
    Unavailable(String),
    #[error("Account not found: {0}")]
    UnknownAccount(Address),
}

impl ExecutionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Unavailable(_))
    }
}

/// Signer set, threshold and nonce of an account at one point in time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub signers: BTreeSet<Address>,
    pub threshold: u32,
    pub nonce: u64,
}

impl AccountState {
    /// Create a validated account state
    ///
    /// # Errors
    /// Returns error if the signer list is empty or has duplicates, or if the
    /// threshold is outside `1..=signers.len()`
    pub fn new(signers: Vec<Address>, threshold: u32, nonce: u64) -> Result<Self, AccountError> {
        if signers.is_empty() {
            return Err(AccountError::NoSigners);
        }

        let mut set = BTreeSet::new();
        for signer in signers {
            if !set.insert(signer) {
                return Err(AccountError::DuplicateSigner(signer));
            }
        }

        let state = Self {
            signers: set,
            threshold,
            nonce,
        };
        state.check_threshold()?;
        Ok(state)
    }

    pub(crate) fn check_threshold(&self) -> Result<(), AccountError> {
        if self.threshold == 0 {
            return Err(AccountError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.threshold as usize > self.signers.len() {
            return Err(AccountError::InvalidThreshold(format!(
                "threshold {} exceeds signer count {}",
                self.threshold,
                self.signers.len()
            )));
        }
        Ok(())
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }
}

/// Outcome of the acceptance rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validity {
    Valid,
    /// The account already moved past this nonce; the proposal can never execute
    StaleNonce { proposal: u64, current: u64 },
    /// Earlier nonces must execute first
    FutureNonce { proposal: u64, current: u64 },
    InsufficientEndorsements { have: usize, need: u32 },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Validity::StaleNonce { .. })
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => write!(f, "valid"),
            Validity::StaleNonce { proposal, current } => {
                write!(f, "stale nonce {} (account at {})", proposal, current)
            }
            Validity::FutureNonce { proposal, current } => {
                write!(f, "future nonce {} (account at {})", proposal, current)
            }
            Validity::InsufficientEndorsements { have, need } => {
                write!(f, "{} of {} endorsements", have, need)
            }
        }
    }
}

/// Proof that a proposal executed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Identifier assigned by the execution layer
    pub receipt_id: String,
    pub proposal_hash: TxHash,
    pub account: Address,
    /// Nonce consumed by the execution
    pub nonce: u64,
    pub executed_at: DateTime<Utc>,
}

/// Access to the on-chain side of a multisig account
#[async_trait]
pub trait MultisigAccountView: Send + Sync {
    /// Read signer set, threshold and nonce; never cached
    async fn current_state(&self, account: &Address) -> Result<AccountState, ExecutionError>;

    /// Apply the acceptance rule against the current state
    async fn validate(
        &self,
        proposal: &TransactionProposal,
        endorsements: &[Endorsement],
    ) -> Result<Validity, ExecutionError> {
        let state = self.current_state(&proposal.account).await?;
        Ok(evaluate(&state, proposal, endorsements))
    }

    async fn is_valid(
        &self,
        proposal: &TransactionProposal,
        endorsements: &[Endorsement],
    ) -> Result<bool, ExecutionError> {
        Ok(self.validate(proposal, endorsements).await?.is_valid())
    }

    /// Submit for execution; consumes the account nonce on success
    async fn execute(
        &self,
        proposal: &TransactionProposal,
        endorsements: &[Endorsement],
    ) -> Result<ExecutionReceipt, ExecutionError>;

    /// Look up a past execution of `hash` on `account`
    async fn find_execution(
        &self,
        account: &Address,
        hash: &TxHash,
    ) -> Result<Option<ExecutionReceipt>, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_account_state_validation() {
        let state = AccountState::new(vec![addr(1), addr(2), addr(3)], 2, 5).unwrap();
        assert_eq!(state.signer_count(), 3);
        assert!(state.is_signer(&addr(2)));
        assert!(!state.is_signer(&addr(4)));

        assert_eq!(AccountState::new(vec![], 1, 0), Err(AccountError::NoSigners));
        assert!(matches!(
            AccountState::new(vec![addr(1), addr(2)], 0, 0),
            Err(AccountError::InvalidThreshold(_))
        ));
        assert!(matches!(
            AccountState::new(vec![addr(1), addr(2)], 3, 0),
            Err(AccountError::InvalidThreshold(_))
        ));
        assert_eq!(
            AccountState::new(vec![addr(1), addr(1)], 1, 0),
            Err(AccountError::DuplicateSigner(addr(1)))
        );
    }

    #[test]
    fn test_single_signer_account() {
        let state = AccountState::new(vec![addr(7)], 1, 0).unwrap();
        assert_eq!(state.threshold, 1);
    }

    #[test]
    fn test_validity_display() {
        assert_eq!(
            Validity::InsufficientEndorsements { have: 1, need: 2 }.to_string(),
            "1 of 2 endorsements"
        );
        assert!(Validity::StaleNonce {
            proposal: 4,
            current: 5
        }
        .is_stale());
    }
}
