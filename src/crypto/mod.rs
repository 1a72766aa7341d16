//! Cryptographic utilities
//!
//! This module provides:
//! - keccak-256 hashing
//! - ECDSA key management (secp256k1)
//! - Recoverable signatures and signer recovery

pub mod hash;
pub mod keys;

pub use hash::{decode_hex, keccak256, keccak256_concat, HashError, ShortHex, TxHash};
pub use keys::{
    public_key_to_address, recover_signer, sign_hash, KeyError, KeyPair, Signature,
    SIGNATURE_LENGTH,
};
