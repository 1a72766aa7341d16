//! Core transaction components
//!
//! This module contains the fundamental building blocks:
//! - Addresses (EIP-55 checksums)
//! - Call encoding (method signatures, typed arguments)
//! - Transaction builder (intents)
//! - Proposals (canonical typed-data hash)
//! - Endorsements (recoverable signer approvals)

pub mod abi;
pub mod address;
pub mod builder;
pub mod endorsement;
pub mod proposal;
pub mod serde_helpers;

pub use abi::{AbiError, MethodSignature, Token};
pub use address::{parse_address, Address, AddressError};
pub use builder::{build, build_from_strings, BuildError, TransactionBuilder, TransactionIntent};
pub use endorsement::Endorsement;
pub use proposal::{
    canonical_hash, domain_separator, safe_domain, Operation, SafeTxParams, TransactionProposal,
};
