//! Transaction proposals and their canonical hash
//!
//! The hash follows the Safe typed-data layout: a domain separator bound to the
//! chain id and the multisig account, combined with the struct hash of the
//! transaction fields and the account nonce.

use crate::core::address::Address;
use crate::core::builder::TransactionIntent;
use crate::crypto::TxHash;
use alloy_primitives::{B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

/// Type string of the domain separator
pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

/// Type string of the transaction struct
pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

sol! {
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}

/// How the account dispatches the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
}

impl Operation {
    pub fn as_u8(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Operation::Call),
            1 => Some(Operation::DelegateCall),
            _ => None,
        }
    }
}

/// Gas and refund parameters; all zero means the executor pays and no refund is made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SafeTxParams {
    pub operation: Operation,
    pub safe_tx_gas: u64,
    pub base_gas: u64,
    #[serde(with = "crate::core::serde_helpers::u256_string")]
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
}

/// An intent bound to an account and nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionProposal {
    pub intent: TransactionIntent,
    pub params: SafeTxParams,
    /// The multisig account that will execute the call
    pub account: Address,
    pub nonce: u64,
    pub chain_id: u64,
    /// Canonical digest the signers endorse
    pub hash: TxHash,
}

impl TransactionProposal {
    pub fn new(
        intent: TransactionIntent,
        params: SafeTxParams,
        account: Address,
        nonce: u64,
        chain_id: u64,
    ) -> Self {
        let hash = canonical_hash(&intent, &params, &account, nonce, chain_id);
        Self {
            intent,
            params,
            account,
            nonce,
            chain_id,
            hash,
        }
    }

    /// Recompute the digest from the fields
    pub fn compute_hash(&self) -> TxHash {
        canonical_hash(
            &self.intent,
            &self.params,
            &self.account,
            self.nonce,
            self.chain_id,
        )
    }

    /// Whether the stored hash matches the fields
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// The same intent and parameters rebound to another nonce
    pub fn rebind(&self, nonce: u64) -> Self {
        Self::new(
            self.intent.clone(),
            self.params.clone(),
            self.account,
            nonce,
            self.chain_id,
        )
    }
}

/// Typed-data domain of an account: chain id and verifying contract only
pub fn safe_domain(chain_id: u64, account: &Address) -> Eip712Domain {
    Eip712Domain::new(None, None, Some(U256::from(chain_id)), Some(*account), None)
}

/// Domain separator for an account on a chain
pub fn domain_separator(chain_id: u64, account: &Address) -> B256 {
    safe_domain(chain_id, account).separator()
}

/// Digest over (intent, params, account, nonce, chain id)
pub fn canonical_hash(
    intent: &TransactionIntent,
    params: &SafeTxParams,
    account: &Address,
    nonce: u64,
    chain_id: u64,
) -> TxHash {
    let tx = SafeTx {
        to: intent.target,
        value: intent.value,
        data: intent.data.clone().into(),
        operation: params.operation.as_u8(),
        safeTxGas: U256::from(params.safe_tx_gas),
        baseGas: U256::from(params.base_gas),
        gasPrice: params.gas_price,
        gasToken: params.gas_token,
        refundReceiver: params.refund_receiver,
        nonce: U256::from(nonce),
    };
    tx.eip712_signing_hash(&safe_domain(chain_id, account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::parse_address;
    use crate::core::builder::build;
    use crate::crypto::{keccak256, keccak256_concat};

    const SAFE: &str = "0x71120e01af18a7b51be30da193ee0586b4f7f068";
    const TOKEN: &str = "0x2dd0849e27b78cb66e144a50105e785cfd815eaa";

    fn intent() -> TransactionIntent {
        build(TOKEN, "pause()", &[], None).unwrap()
    }

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes::<32>()
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(SafeTx::eip712_encode_type(), SAFE_TX_TYPE);
        assert_eq!(safe_domain(5, &Address::ZERO).encode_type(), DOMAIN_TYPE);
    }

    #[test]
    fn test_hash_matches_typed_data_layout() {
        let account = parse_address(SAFE).unwrap();
        let intent = intent();
        let digest = canonical_hash(&intent, &SafeTxParams::default(), &account, 3, 5);

        let domain = keccak256_concat(&[
            keccak256(DOMAIN_TYPE.as_bytes()).as_slice(),
            &word(5),
            account.into_word().as_slice(),
        ]);
        assert_eq!(domain, domain_separator(5, &account));

        let struct_hash = keccak256_concat(&[
            keccak256(SAFE_TX_TYPE.as_bytes()).as_slice(),
            intent.target.into_word().as_slice(),
            &word(0),
            keccak256(&intent.data).as_slice(),
            &word(0),
            &word(0),
            &word(0),
            &word(0),
            Address::ZERO.into_word().as_slice(),
            Address::ZERO.into_word().as_slice(),
            &word(3),
        ]);
        let expected = keccak256_concat(&[&[0x19, 0x01], domain.as_slice(), struct_hash.as_slice()]);
        assert_eq!(digest, expected);
    }

    #[test]
    fn test_type_hashes() {
        assert_eq!(
            hex::encode(keccak256(DOMAIN_TYPE.as_bytes())),
            "47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218"
        );
        assert_eq!(
            hex::encode(keccak256(SAFE_TX_TYPE.as_bytes())),
            "bb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8"
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let account = parse_address(SAFE).unwrap();
        for nonce in [0u64, 1, 5, 1_000] {
            let a = TransactionProposal::new(intent(), SafeTxParams::default(), account, nonce, 5);
            let b = TransactionProposal::new(intent(), SafeTxParams::default(), account, nonce, 5);
            assert_eq!(a.hash, b.hash);
            assert!(a.verify_hash());
        }
    }

    #[test]
    fn test_hash_binds_every_field() {
        let account = parse_address(SAFE).unwrap();
        let base = TransactionProposal::new(intent(), SafeTxParams::default(), account, 5, 5);

        let other_nonce = base.rebind(6);
        let other_chain = TransactionProposal::new(intent(), SafeTxParams::default(), account, 5, 1);
        let other_account =
            TransactionProposal::new(intent(), SafeTxParams::default(), Address::repeat_byte(9), 5, 5);
        let delegate = TransactionProposal::new(
            intent(),
            SafeTxParams {
                operation: Operation::DelegateCall,
                ..Default::default()
            },
            account,
            5,
            5,
        );
        let mut funded_intent = intent();
        funded_intent.value = U256::from(1);
        let funded = TransactionProposal::new(funded_intent, SafeTxParams::default(), account, 5, 5);

        for variant in [other_nonce, other_chain, other_account, delegate, funded] {
            assert_ne!(variant.hash, base.hash);
        }
    }

    #[test]
    fn test_tampered_proposal_fails_verification() {
        let account = parse_address(SAFE).unwrap();
        let mut proposal = TransactionProposal::new(intent(), SafeTxParams::default(), account, 5, 5);
        proposal.nonce = 6;
        assert!(!proposal.verify_hash());
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::from_u8(0), Some(Operation::Call));
        assert_eq!(Operation::from_u8(1), Some(Operation::DelegateCall));
        assert_eq!(Operation::from_u8(2), None);
        assert_eq!(Operation::DelegateCall.as_u8(), 1);
    }
}
