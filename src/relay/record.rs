//! Stored proposal records

use crate::account::ExecutionReceipt;
use crate::core::{Address, Endorsement, TransactionProposal};
use crate::crypto::{ShortHex, TxHash};
use crate::relay::RelayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a record at the relay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// Collecting endorsements or waiting to execute
    Pending,
    Executed { receipt: ExecutionReceipt },
    Failed { reason: String },
}

/// A proposal and the endorsements gathered so far
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal: TransactionProposal,
    /// In arrival order, append-only
    pub endorsements: Vec<Endorsement>,
    pub status: RecordStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProposalRecord {
    /// Create a pending record holding the initiator's endorsement
    pub fn new(proposal: TransactionProposal, endorsement: Endorsement) -> Self {
        let now = Utc::now();
        Self {
            proposal,
            endorsements: vec![endorsement],
            status: RecordStatus::Pending,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn hash(&self) -> TxHash {
        self.proposal.hash
    }

    /// Append an endorsement
    ///
    /// Returns `Ok(false)` when the identical endorsement is already present.
    /// A different signature from a signer that already endorsed is rejected.
    pub fn add_endorsement(&mut self, endorsement: Endorsement) -> Result<bool, RelayError> {
        if endorsement.proposal_hash != self.proposal.hash {
            return Err(RelayError::Rejected(format!(
                "endorsement is for {}, not {}",
                endorsement.proposal_hash.short(),
                self.proposal.hash.short()
            )));
        }

        if let Some(existing) = self.endorsement_from(&endorsement.signer) {
            if *existing == endorsement {
                return Ok(false);
            }
            return Err(RelayError::Rejected(format!(
                "{} already endorsed with a different signature",
                endorsement.signer
            )));
        }

        self.endorsements.push(endorsement);
        self.updated_at = Utc::now();
        Ok(true)
    }

    pub fn endorsement_from(&self, signer: &Address) -> Option<&Endorsement> {
        self.endorsements.iter().find(|e| e.signer == *signer)
    }

    pub fn has_endorsed(&self, signer: &Address) -> bool {
        self.endorsement_from(signer).is_some()
    }

    /// Signers that have endorsed, in arrival order
    pub fn signers(&self) -> Vec<Address> {
        self.endorsements.iter().map(|e| e.signer).collect()
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    pub fn receipt(&self) -> Option<&ExecutionReceipt> {
        match &self.status {
            RecordStatus::Executed { receipt } => Some(receipt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{build, SafeTxParams};
    use crate::crypto::KeyPair;

    fn proposal() -> TransactionProposal {
        let intent = build("0x2dd0849e27b78cb66e144a50105e785cfd815eaa", "pause()", &[], None).unwrap();
        TransactionProposal::new(intent, SafeTxParams::default(), Address::repeat_byte(3), 0, 5)
    }

    fn endorse(kp: &KeyPair, proposal: &TransactionProposal) -> Endorsement {
        Endorsement::new(proposal.hash, kp.address(), kp.sign_hash(&proposal.hash).unwrap())
    }

    #[test]
    fn test_add_endorsement() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let p = proposal();
        let mut record = ProposalRecord::new(p.clone(), endorse(&a, &p));

        assert!(record.add_endorsement(endorse(&b, &p)).unwrap());
        assert_eq!(record.signers(), vec![a.address(), b.address()]);
        assert!(record.has_endorsed(&b.address()));
        assert!(record.is_pending());
    }

    #[test]
    fn test_duplicate_endorsement_is_noop() {
        let a = KeyPair::generate();
        let p = proposal();
        let first = endorse(&a, &p);
        let mut record = ProposalRecord::new(p.clone(), first.clone());

        assert!(!record.add_endorsement(first).unwrap());
        assert_eq!(record.endorsements.len(), 1);
    }

    #[test]
    fn test_mismatched_duplicate_rejected() {
        let a = KeyPair::generate();
        let other = KeyPair::generate();
        let p = proposal();
        let mut record = ProposalRecord::new(p.clone(), endorse(&a, &p));

        let altered = Endorsement::new(p.hash, a.address(), other.sign_hash(&p.hash).unwrap());
        assert!(matches!(
            record.add_endorsement(altered),
            Err(RelayError::Rejected(_))
        ));

        let elsewhere = Endorsement::new(
            TxHash::repeat_byte(1),
            other.address(),
            other.sign_hash(&TxHash::repeat_byte(1)).unwrap(),
        );
        assert!(matches!(
            record.add_endorsement(elsewhere),
            Err(RelayError::Rejected(_))
        ));
        assert_eq!(record.endorsements.len(), 1);
    }
}
