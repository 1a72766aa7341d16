//! Signer capability
//!
//! The coordinator never touches key material. It asks an opaque [`Signer`] to
//! produce a signature over a proposal hash and checks the result by recovery.

use crate::core::Address;
use crate::crypto::{KeyPair, ShortHex, Signature, TxHash};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors returned by a signer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signer declined: {0}")]
    Declined(String),
    #[error("Signer unavailable: {0}")]
    Unavailable(String),
}

/// Something able to endorse a hash on behalf of one identity
#[async_trait]
pub trait Signer: Send + Sync {
    /// The address the produced signatures recover to
    fn identity(&self) -> Address;

    async fn sign(&self, hash: &TxHash) -> Result<Signature, SignerError>;
}

/// Signer backed by an in-process secp256k1 key
pub struct LocalSigner {
    keypair: KeyPair,
    declining: AtomicBool,
}

impl LocalSigner {
    pub fn new(keypair: KeyPair) -> Self {
        Self {
            keypair,
            declining: AtomicBool::new(false),
        }
    }

    pub fn random() -> Self {
        Self::new(KeyPair::generate())
    }

    /// Load from a hex private key (`0x` optional)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, crate::crypto::KeyError> {
        Ok(Self::new(KeyPair::from_private_key_hex(hex_key)?))
    }

    /// Make every subsequent request fail with [`SignerError::Declined`]
    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("identity", &self.keypair.address())
            .finish()
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn identity(&self) -> Address {
        self.keypair.address()
    }

    async fn sign(&self, hash: &TxHash) -> Result<Signature, SignerError> {
        if self.declining.load(Ordering::SeqCst) {
            return Err(SignerError::Declined(format!(
                "{} refused to sign {}",
                self.identity(),
                hash.short()
            )));
        }
        self.keypair
            .sign_hash(hash)
            .map_err(|e| SignerError::Unavailable(e.to_string()))
    }
}
