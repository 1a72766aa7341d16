//! Multisig Coordinator: threshold authorization of multisig transactions
//!
//! This crate coordinates the steps between "someone wants this call made by
//! a shared account" and "the call executed exactly once":
//! - Canonical Safe-style (EIP-712) proposal hashes bound to account, chain and nonce
//! - Recoverable secp256k1 endorsements from the account's signers
//! - A relay client that stores proposals and gathers endorsements
//! - Threshold and nonce validation against the account's current state
//! - A resumable, cancellable coordinator with bounded retries
//!
//! # Example
//!
//! ```rust,no_run
//! use multisig_coordinator::account::{AccountState, InMemoryLedger};
//! use multisig_coordinator::coordinator::{Coordinator, CoordinatorConfig};
//! use multisig_coordinator::core::{build, Address, SafeTxParams};
//! use multisig_coordinator::relay::InMemoryRelay;
//! use multisig_coordinator::signer::{LocalSigner, Signer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (alice, bob) = (LocalSigner::random(), LocalSigner::random());
//! let account = Address::repeat_byte(0x5a);
//!
//! let ledger = Arc::new(InMemoryLedger::new());
//! ledger
//!     .register(account, AccountState::new(vec![alice.identity(), bob.identity()], 2, 0)?)
//!     .await?;
//! let coordinator = Coordinator::new(
//!     Arc::new(InMemoryRelay::new()),
//!     ledger,
//!     CoordinatorConfig::default(),
//! );
//!
//! let intent = build("0x2dd0849e27b78cb66e144a50105e785cfd815eaa", "pause()", &[], None)?;
//! let cancel = CancellationToken::new();
//! let outcome = coordinator
//!     .authorize(account, intent, SafeTxParams::default(), &alice, &[&bob], &cancel)
//!     .await?;
//! println!("{}: {}", outcome.hash, outcome.state);
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod cli;
pub mod coordinator;
pub mod core;
pub mod crypto;
pub mod relay;
pub mod signer;

// Re-export commonly used types
pub use account::{
    AccountError, AccountState, ExecutionError, ExecutionReceipt, InMemoryLedger,
    MultisigAccountView, Validity,
};
pub use coordinator::{
    Authorization, AuthorizationState, Coordinator, CoordinatorConfig, CoordinatorError,
    EndorseOutcome, ErrorKind, PendingProposal, RetryPolicy,
};
pub use core::{
    build, build_from_strings, parse_address, Address, BuildError, Endorsement, MethodSignature,
    Operation, SafeTxParams, Token, TransactionBuilder, TransactionIntent, TransactionProposal,
};
pub use crypto::{KeyPair, Signature, TxHash};
pub use relay::{
    HttpRelayClient, InMemoryRelay, ProposalRecord, RecordOutcome, RecordStatus, RelayClient,
    RelayError,
};
pub use signer::{LocalSigner, Signer, SignerError};
