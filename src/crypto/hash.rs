//! Cryptographic hashing utilities
//!
//! keccak-256 and the 32-byte digest type come from `alloy-primitives`; this
//! module adds the helpers the rest of the crate shares.

use alloy_primitives::{Keccak256, B256};
use thiserror::Error;

pub use alloy_primitives::keccak256;

/// A 32-byte transaction digest, rendered as `0x` hex
pub type TxHash = B256;

/// Computes keccak-256 over several byte slices as if they were concatenated
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Decode a hex string with an optional `0x` prefix
pub fn decode_hex(value: &str) -> Result<Vec<u8>, HashError> {
    let trimmed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(trimmed).map_err(|e| HashError::InvalidHex(e.to_string()))
}

/// Errors while parsing hex input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// Abbreviated hex form for log lines
pub trait ShortHex {
    fn short(&self) -> String;
}

impl ShortHex for B256 {
    fn short(&self) -> String {
        format!("0x{}", hex::encode(&self[..6]))
    }
}
