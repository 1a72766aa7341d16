//! Acceptance rule for a proposal and its endorsements
//!
//! Pure functions of the account state, so every caller (ledger, coordinator,
//! tests) agrees on what "valid" means.

use crate::account::{AccountState, Validity};
use crate::core::{Address, Endorsement, TransactionProposal};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Signers whose endorsements count towards the threshold
///
/// An endorsement counts when it is over the proposal hash, its signer is in
/// the *current* signer set and its signature recovers to that signer. Each
/// signer counts once.
pub fn counted_signers(
    state: &AccountState,
    proposal: &TransactionProposal,
    endorsements: &[Endorsement],
) -> BTreeSet<Address> {
    counted_endorsements(state, proposal, endorsements)
        .map(|e| e.signer)
        .collect()
}

fn counted_endorsements<'a>(
    state: &'a AccountState,
    proposal: &'a TransactionProposal,
    endorsements: &'a [Endorsement],
) -> impl Iterator<Item = &'a Endorsement> + 'a {
    endorsements
        .iter()
        .filter(move |e| e.proposal_hash == proposal.hash)
        .filter(move |e| state.is_signer(&e.signer))
        .filter(|e| e.is_authentic())
}

/// Evaluate a proposal against the account state
pub fn evaluate(
    state: &AccountState,
    proposal: &TransactionProposal,
    endorsements: &[Endorsement],
) -> Validity {
    match proposal.nonce.cmp(&state.nonce) {
        Ordering::Less => {
            return Validity::StaleNonce {
                proposal: proposal.nonce,
                current: state.nonce,
            }
        }
        Ordering::Greater => {
            return Validity::FutureNonce {
                proposal: proposal.nonce,
                current: state.nonce,
            }
        }
        Ordering::Equal => {}
    }

    let have = counted_signers(state, proposal, endorsements).len();
    if have < state.threshold as usize {
        return Validity::InsufficientEndorsements {
            have,
            need: state.threshold,
        };
    }

    Validity::Valid
}

/// Counted signatures concatenated in ascending signer order
///
/// This is the layout a Safe contract expects in `execTransaction`. Only
/// endorsements that count are packed, the first one per signer.
pub fn packed_signatures(
    state: &AccountState,
    proposal: &TransactionProposal,
    endorsements: &[Endorsement],
) -> Vec<u8> {
    let mut by_signer: BTreeMap<Address, &Endorsement> = BTreeMap::new();
    for endorsement in counted_endorsements(state, proposal, endorsements) {
        by_signer.entry(endorsement.signer).or_insert(endorsement);
    }

    by_signer
        .values()
        .flat_map(|e| e.signature.as_bytes().to_vec())
        .collect()
}
