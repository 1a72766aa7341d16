//! Authorization states of a proposal

use crate::account::{ExecutionReceipt, Validity};
use crate::coordinator::error::{CoordinatorError, ErrorKind};
use crate::crypto::TxHash;
use crate::relay::ProposalRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a proposal stands, derived from the relay record and the account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthorizationState {
    /// Canonical hash computed, nothing sent yet
    Built,
    /// Stored at the relay, no endorsement counts yet
    Proposed,
    AwaitingThreshold { have: usize, need: u32 },
    /// Waits for earlier nonces of the account to execute
    Queued { nonce: u64, current: u64 },
    ReadyToExecute,
    Executed { receipt: ExecutionReceipt },
    Rejected { reason: String },
    Failed { kind: ErrorKind, reason: String },
    /// The account moved past this nonce; rebuild to continue
    Stale { nonce: u64, current: u64 },
}

impl AuthorizationState {
    /// State of a pending proposal given the acceptance rule's verdict
    pub fn from_validity(validity: Validity) -> Self {
        match validity {
            Validity::Valid => AuthorizationState::ReadyToExecute,
            Validity::StaleNonce { proposal, current } => AuthorizationState::Stale {
                nonce: proposal,
                current,
            },
            Validity::FutureNonce { proposal, current } => AuthorizationState::Queued {
                nonce: proposal,
                current,
            },
            Validity::InsufficientEndorsements { have: 0, .. } => AuthorizationState::Proposed,
            Validity::InsufficientEndorsements { have, need } => {
                AuthorizationState::AwaitingThreshold { have, need }
            }
        }
    }

    /// Terminal state a proposal ends in after `err`, if the error settles it
    pub fn from_terminal_error(err: &CoordinatorError) -> Option<Self> {
        match err {
            CoordinatorError::ProposalConflict(_) | CoordinatorError::RelayRejected(_) => {
                Some(AuthorizationState::Rejected {
                    reason: err.to_string(),
                })
            }
            CoordinatorError::ExecutionReverted(reason) => Some(AuthorizationState::Failed {
                kind: err.kind(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthorizationState::Executed { .. }
                | AuthorizationState::Rejected { .. }
                | AuthorizationState::Failed { .. }
        )
    }

    /// Still collecting endorsements or waiting its turn
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            AuthorizationState::Proposed
                | AuthorizationState::AwaitingThreshold { .. }
                | AuthorizationState::Queued { .. }
        )
    }

    pub fn receipt(&self) -> Option<&ExecutionReceipt> {
        match self {
            AuthorizationState::Executed { receipt } => Some(receipt),
            _ => None,
        }
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationState::Built => write!(f, "built"),
            AuthorizationState::Proposed => write!(f, "proposed"),
            AuthorizationState::AwaitingThreshold { have, need } => {
                write!(f, "awaiting threshold ({}/{})", have, need)
            }
            AuthorizationState::Queued { nonce, current } => {
                write!(f, "queued (nonce {}, account at {})", nonce, current)
            }
            AuthorizationState::ReadyToExecute => write!(f, "ready to execute"),
            AuthorizationState::Executed { receipt } => {
                write!(f, "executed ({})", receipt.receipt_id)
            }
            AuthorizationState::Rejected { reason } => write!(f, "rejected: {}", reason),
            AuthorizationState::Failed { kind, reason } => {
                write!(f, "failed ({:?}): {}", kind, reason)
            }
            AuthorizationState::Stale { nonce, current } => {
                write!(f, "stale (nonce {}, account at {})", nonce, current)
            }
        }
    }
}

/// A pending relay record with its derived state
#[derive(Clone, Debug)]
pub struct PendingProposal {
    pub record: ProposalRecord,
    pub state: AuthorizationState,
}

impl PendingProposal {
    pub fn hash(&self) -> TxHash {
        self.record.hash()
    }
}

/// Result of soliciting one endorsement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndorseOutcome {
    Accepted,
    /// The signer had already endorsed; nothing was sent
    AlreadyRecorded,
}

/// Final result of a one-shot authorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    pub hash: TxHash,
    pub state: AuthorizationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_validity() {
        assert_eq!(
            AuthorizationState::from_validity(Validity::Valid),
            AuthorizationState::ReadyToExecute
        );
        assert_eq!(
            AuthorizationState::from_validity(Validity::InsufficientEndorsements { have: 0, need: 2 }),
            AuthorizationState::Proposed
        );
        assert_eq!(
            AuthorizationState::from_validity(Validity::InsufficientEndorsements { have: 1, need: 2 }),
            AuthorizationState::AwaitingThreshold { have: 1, need: 2 }
        );
        assert_eq!(
            AuthorizationState::from_validity(Validity::StaleNonce {
                proposal: 4,
                current: 5
            }),
            AuthorizationState::Stale {
                nonce: 4,
                current: 5
            }
        );
        assert!(AuthorizationState::from_validity(Validity::FutureNonce {
            proposal: 6,
            current: 5
        })
        .is_pending());
    }

    #[test]
    fn test_terminal_states() {
        assert!(AuthorizationState::Rejected {
            reason: "conflict".into()
        }
        .is_terminal());
        assert!(!AuthorizationState::Stale {
            nonce: 1,
            current: 2
        }
        .is_terminal());
        assert!(!AuthorizationState::ReadyToExecute.is_pending());
    }

    #[test]
    fn test_terminal_errors() {
        let conflict = CoordinatorError::ProposalConflict(TxHash::repeat_byte(1));
        assert!(matches!(
            AuthorizationState::from_terminal_error(&conflict),
            Some(AuthorizationState::Rejected { .. })
        ));
        assert_eq!(
            AuthorizationState::from_terminal_error(&CoordinatorError::ExecutionReverted(
                "GS013".into()
            )),
            Some(AuthorizationState::Failed {
                kind: ErrorKind::ExecutionReverted,
                reason: "GS013".into()
            })
        );
        let stale = CoordinatorError::StaleNonce {
            proposal: 1,
            current: 2,
        };
        assert_eq!(AuthorizationState::from_terminal_error(&stale), None);
        assert_eq!(
            AuthorizationState::from_terminal_error(&CoordinatorError::Cancelled),
            None
        );
        assert_eq!(AuthorizationState::Built.to_string(), "built");
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_value(AuthorizationState::AwaitingThreshold { have: 1, need: 2 })
            .unwrap();
        assert_eq!(json["state"], "awaiting_threshold");
        assert_eq!(json["have"], 1);
    }
}
