//! ECDSA key management
//!
//! Provides key pair generation, recoverable signing and signer recovery using
//! the secp256k1 elliptic curve. Identities are 20-byte account addresses
//! derived from the uncompressed public key.

use crate::core::Address;
use crate::crypto::hash::{decode_hex, TxHash};
use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid recovery id: {0} (expected 0, 1, 27 or 28)")]
    InvalidRecoveryId(u8),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A recoverable ECDSA signature in `r || s || v` form with `v` in {27, 28}
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Build from raw bytes, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|_| {
            KeyError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The recovery byte
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key (`0x` prefix optional)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// The account address controlled by this key
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest
    pub fn sign_hash(&self, hash: &TxHash) -> Result<Signature, KeyError> {
        sign_hash(&self.secret_key, hash)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Derive an account address: last 20 bytes of keccak256(uncompressed key sans prefix)
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_raw_public_key(&uncompressed[1..])
}

/// Sign a digest with a secret key, producing `r || s || v` with `v` = 27 + recovery id
pub fn sign_hash(secret_key: &SecretKey, hash: &TxHash) -> Result<Signature, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(hash.as_slice())?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut bytes = [0u8; SIGNATURE_LENGTH];
    bytes[..64].copy_from_slice(&compact);
    bytes[64] = 27 + recovery_id.to_i32() as u8;
    Ok(Signature(bytes))
}

/// Recover the address that produced `signature` over `hash`
pub fn recover_signer(hash: &TxHash, signature: &Signature) -> Result<Address, KeyError> {
    let v = signature.v();
    let recovery_id = match v {
        0 | 1 => v as i32,
        27 | 28 => (v - 27) as i32,
        other => return Err(KeyError::InvalidRecoveryId(other)),
    };
    let recovery_id = RecoveryId::from_i32(recovery_id)?;
    let recoverable = RecoverableSignature::from_compact(&signature.0[..64], recovery_id)
        .map_err(|e| KeyError::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest_slice(hash.as_slice())?;
    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
    Ok(public_key_to_address(&public_key))
}
