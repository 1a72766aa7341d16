//! Signer endorsements over a proposal hash

use crate::core::address::Address;
use crate::crypto::{recover_signer, KeyError, Signature, TxHash};
use serde::{Deserialize, Serialize};

/// A single signer's approval of a proposal hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    /// Hash that was signed
    pub proposal_hash: TxHash,
    /// Identity claiming the signature
    pub signer: Address,
    /// `r || s || v` signature bytes
    pub signature: Signature,
}

impl Endorsement {
    pub fn new(proposal_hash: TxHash, signer: Address, signature: Signature) -> Self {
        Self {
            proposal_hash,
            signer,
            signature,
        }
    }

    /// Check that the signature recovers to the claimed signer
    pub fn verify(&self) -> Result<bool, KeyError> {
        Ok(recover_signer(&self.proposal_hash, &self.signature)? == self.signer)
    }

    /// Like [`Endorsement::verify`] but treats malformed signatures as invalid
    pub fn is_authentic(&self) -> bool {
        self.verify().unwrap_or(false)
    }
}
