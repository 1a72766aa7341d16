//! Coordinator errors

use crate::account::ExecutionError;
use crate::core::{Address, BuildError};
use crate::crypto::TxHash;
use crate::relay::RelayError;
use crate::signer::SignerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a coordinator failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Build,
    RelayUnavailable,
    UnknownProposal,
    ProposalConflict,
    RelayRejected,
    SignatureDeclined,
    SignerUnavailable,
    UnauthorizedSigner,
    StaleNonce,
    ExecutionReverted,
    ExecutionUnavailable,
    Cancelled,
}

/// Errors surfaced by [`crate::coordinator::Coordinator`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),
    #[error("Relay unavailable: {0}")]
    RelayUnavailable(String),
    #[error("Unknown proposal: {0}")]
    UnknownProposal(TxHash),
    #[error("Relay holds a different proposal under {0}")]
    ProposalConflict(TxHash),
    #[error("Relay rejected request: {0}")]
    RelayRejected(String),
    #[error("Signer {signer} declined: {reason}")]
    SignatureDeclined { signer: Address, reason: String },
    #[error("Signer {signer} unavailable: {reason}")]
    SignerUnavailable { signer: Address, reason: String },
    #[error("{signer} is not a signer of {account}")]
    UnauthorizedSigner { signer: Address, account: Address },
    #[error("Nonce {proposal} is stale, account is at {current}")]
    StaleNonce { proposal: u64, current: u64 },
    #[error("Execution reverted: {0}")]
    ExecutionReverted(String),
    #[error("Execution layer unavailable: {0}")]
    ExecutionUnavailable(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::Build(_) => ErrorKind::Build,
            CoordinatorError::RelayUnavailable(_) => ErrorKind::RelayUnavailable,
            CoordinatorError::UnknownProposal(_) => ErrorKind::UnknownProposal,
            CoordinatorError::ProposalConflict(_) => ErrorKind::ProposalConflict,
            CoordinatorError::RelayRejected(_) => ErrorKind::RelayRejected,
            CoordinatorError::SignatureDeclined { .. } => ErrorKind::SignatureDeclined,
            CoordinatorError::SignerUnavailable { .. } => ErrorKind::SignerUnavailable,
            CoordinatorError::UnauthorizedSigner { .. } => ErrorKind::UnauthorizedSigner,
            CoordinatorError::StaleNonce { .. } => ErrorKind::StaleNonce,
            CoordinatorError::ExecutionReverted(_) => ErrorKind::ExecutionReverted,
            CoordinatorError::ExecutionUnavailable(_) => ErrorKind::ExecutionUnavailable,
            CoordinatorError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Worth retrying with the same payload
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RelayUnavailable
                | ErrorKind::SignerUnavailable
                | ErrorKind::ExecutionUnavailable
        )
    }

    /// The proposal must be rebuilt against the current nonce
    pub fn is_rebuild_signal(&self) -> bool {
        self.kind() == ErrorKind::StaleNonce
    }
}

impl From<RelayError> for CoordinatorError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Unavailable(detail) => CoordinatorError::RelayUnavailable(detail),
            RelayError::UnknownProposal(hash) => CoordinatorError::UnknownProposal(hash),
            RelayError::Conflict(hash) => CoordinatorError::ProposalConflict(hash),
            RelayError::Rejected(reason) => CoordinatorError::RelayRejected(reason),
        }
    }
}

impl From<ExecutionError> for CoordinatorError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Reverted(reason) => CoordinatorError::ExecutionReverted(reason),
            ExecutionError::Unavailable(detail) => CoordinatorError::ExecutionUnavailable(detail),
            ExecutionError::UnknownAccount(account) => {
                CoordinatorError::ExecutionReverted(format!("account {} not found", account))
            }
        }
    }
}

/// Attach the signer identity to a signer failure
pub(crate) fn signer_error(signer: Address, e: SignerError) -> CoordinatorError {
    match e {
        SignerError::Declined(reason) => CoordinatorError::SignatureDeclined { signer, reason },
        SignerError::Unavailable(reason) => CoordinatorError::SignerUnavailable { signer, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_categories() {
        let relay_down: CoordinatorError = RelayError::Unavailable("timeout".into()).into();
        assert_eq!(relay_down.kind(), ErrorKind::RelayUnavailable);
        assert!(relay_down.is_transient());

        let conflict: CoordinatorError = RelayError::Conflict(TxHash::repeat_byte(1)).into();
        assert_eq!(conflict.kind(), ErrorKind::ProposalConflict);
        assert!(!conflict.is_transient());

        let reverted: CoordinatorError = ExecutionError::Reverted("GS013".into()).into();
        assert_eq!(reverted.kind(), ErrorKind::ExecutionReverted);
        assert!(!reverted.is_rebuild_signal());

        let stale = CoordinatorError::StaleNonce {
            proposal: 4,
            current: 5,
        };
        assert!(stale.is_rebuild_signal());
        assert!(!stale.is_transient());
        assert!(!CoordinatorError::Cancelled.is_transient());
    }

    #[test]
    fn test_signer_errors_name_the_signer() {
        let signer = Address::repeat_byte(2);
        let err = signer_error(signer, SignerError::Declined("user rejected".into()));
        assert_eq!(err.kind(), ErrorKind::SignatureDeclined);
        assert!(err.to_string().contains("user rejected"));
        assert!(!err.is_transient());

        let err = signer_error(signer, SignerError::Unavailable("device locked".into()));
        assert_eq!(err.kind(), ErrorKind::SignerUnavailable);
        assert!(err.is_transient());
    }
}
