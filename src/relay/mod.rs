//! Relay client
//!
//! The relay is an off-chain store for proposals that have not executed yet.
//! It keeps the proposal plus an append-only list of endorsements, keyed by
//! the canonical hash, so signers can find and confirm it asynchronously.

pub mod http;
pub mod memory;
pub mod record;
pub mod wire;

use crate::account::ExecutionReceipt;
use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::TxHash;
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpRelayClient;
pub use memory::InMemoryRelay;
pub use record::{ProposalRecord, RecordStatus};

/// Errors from the relay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Transport failure, timeout or server error; the call may be retried
    #[error("Relay unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown proposal: {0}")]
    UnknownProposal(TxHash),
    /// A different proposal is already stored under this hash
    #[error("Conflicting proposal stored under {0}")]
    Conflict(TxHash),
    /// Well-formed request the relay refused
    #[error("Relay rejected request: {0}")]
    Rejected(String),
}

impl RelayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Unavailable(_))
    }
}

/// Terminal marker stored with a record once execution settled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Executed(ExecutionReceipt),
    Failed(String),
}

impl From<RecordOutcome> for RecordStatus {
    fn from(outcome: RecordOutcome) -> Self {
        match outcome {
            RecordOutcome::Executed(receipt) => RecordStatus::Executed { receipt },
            RecordOutcome::Failed(reason) => RecordStatus::Failed { reason },
        }
    }
}

/// Operations the coordinator needs from a relay
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Store a proposal with its initiator's endorsement; idempotent per hash
    async fn propose(
        &self,
        proposal: &TransactionProposal,
        endorsement: &Endorsement,
    ) -> Result<TxHash, RelayError>;

    async fn fetch(&self, hash: &TxHash) -> Result<ProposalRecord, RelayError>;

    /// Append an endorsement; resubmitting an identical one is a no-op
    async fn confirm(&self, hash: &TxHash, endorsement: &Endorsement) -> Result<(), RelayError>;

    /// Unexecuted proposals of an account, by nonce then submission time
    async fn list_pending(&self, account: &Address) -> Result<Vec<ProposalRecord>, RelayError>;

    async fn record_outcome(&self, hash: &TxHash, outcome: RecordOutcome) -> Result<(), RelayError>;
}
