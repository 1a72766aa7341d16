//! Contract call encoding
//!
//! Method signatures such as `transfer(address,uint256)` are parsed into an
//! `alloy-json-abi` [`Function`] and arguments are encoded as
//! `alloy-dyn-abi` values, so the full 256-bit integer range, fixed arrays and
//! tuples are available to callers that only know the method at runtime.

use crate::core::address::{parse_address, AddressError};
use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::Function;
use alloy_primitives::{I256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A typed call argument
pub type Token = DynSolValue;

/// Errors while parsing signatures or encoding arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Malformed method signature: {0}")]
    MalformedSignature(String),
    #[error("Unsupported parameter type: {0}")]
    UnsupportedType(String),
    #[error("Argument count mismatch: method takes {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Argument {index} does not match parameter type {expected}")]
    TypeMismatch { index: usize, expected: String },
    #[error("Value out of range for {0}")]
    OutOfRange(String),
    #[error("Invalid {ty} argument: {reason}")]
    InvalidArgument { ty: String, reason: String },
    #[error("Invalid address argument: {0}")]
    Address(#[from] AddressError),
}

/// A parsed method signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature(Function);

impl MethodSignature {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Canonical form used for the selector, e.g. `transfer(address,uint256)`
    pub fn canonical(&self) -> String {
        self.0.signature()
    }

    /// First four bytes of keccak256 of the canonical form
    pub fn selector(&self) -> [u8; 4] {
        self.0.selector().0
    }

    pub fn arity(&self) -> usize {
        self.0.inputs.len()
    }

    /// Resolved parameter types, in order
    pub fn input_types(&self) -> Result<Vec<DynSolType>, AbiError> {
        self.0
            .inputs
            .iter()
            .map(|param| {
                param
                    .resolve()
                    .map_err(|_| AbiError::UnsupportedType(param.ty.clone()))
            })
            .collect()
    }

    /// Selector followed by the ABI encoding of `args`
    pub fn encode_call(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        if args.len() != self.arity() {
            return Err(AbiError::ArityMismatch {
                expected: self.arity(),
                got: args.len(),
            });
        }

        for (index, (ty, arg)) in self.input_types()?.iter().zip(args).enumerate() {
            if !ty.matches(arg) {
                return Err(AbiError::TypeMismatch {
                    index,
                    expected: ty.sol_type_name().into_owned(),
                });
            }
            check_range(ty, arg)?;
        }

        self.0
            .abi_encode_input(args)
            .map_err(|e| AbiError::InvalidArgument {
                ty: self.canonical(),
                reason: e.to_string(),
            })
    }

    /// Parse textual arguments against the parameter types
    ///
    /// Integers accept decimal or `0x` hex, negative for signed types; arrays
    /// and tuples use `[a, b]` and `(a, b)`. Address parameters must pass the
    /// EIP-55 check when given in mixed case.
    pub fn parse_args(&self, raw: &[String]) -> Result<Vec<Token>, AbiError> {
        if raw.len() != self.arity() {
            return Err(AbiError::ArityMismatch {
                expected: self.arity(),
                got: raw.len(),
            });
        }

        self.input_types()?
            .iter()
            .zip(raw)
            .map(|(ty, raw)| parse_token(ty, raw.trim()))
            .collect()
    }
}

fn parse_token(ty: &DynSolType, raw: &str) -> Result<Token, AbiError> {
    let invalid = |reason: String| AbiError::InvalidArgument {
        ty: ty.sol_type_name().into_owned(),
        reason,
    };
    let token = match ty {
        DynSolType::Address => return Ok(Token::Address(parse_address(raw)?)),
        DynSolType::Uint(bits) => Token::Uint(
            raw.parse::<U256>().map_err(|e| invalid(e.to_string()))?,
            *bits,
        ),
        DynSolType::Int(bits) => Token::Int(
            raw.parse::<I256>().map_err(|e| invalid(e.to_string()))?,
            *bits,
        ),
        _ => ty.coerce_str(raw).map_err(|e| invalid(e.to_string()))?,
    };
    check_range(ty, &token)?;
    Ok(token)
}

/// Reject integers wider than their declared size
fn check_range(ty: &DynSolType, token: &Token) -> Result<(), AbiError> {
    let out_of_range = || AbiError::OutOfRange(ty.sol_type_name().into_owned());
    match (ty, token) {
        (DynSolType::Uint(bits), Token::Uint(value, _)) if *bits < 256 => {
            if *value >> *bits != U256::ZERO {
                return Err(out_of_range());
            }
        }
        (DynSolType::Int(bits), Token::Int(value, _)) if *bits < 256 => {
            // magnitude bits of a two's complement value, sign excluded
            let raw = if value.is_negative() {
                !value.into_raw()
            } else {
                value.into_raw()
            };
            if raw >> (*bits - 1) != U256::ZERO {
                return Err(out_of_range());
            }
        }
        (DynSolType::Array(inner), Token::Array(items))
        | (DynSolType::FixedArray(inner, _), Token::FixedArray(items)) => {
            for item in items {
                check_range(inner, item)?;
            }
        }
        (DynSolType::Tuple(types), Token::Tuple(items)) => {
            for (ty, item) in types.iter().zip(items) {
                check_range(ty, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl FromStr for MethodSignature {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut function = Function::parse(s.trim())
            .map_err(|e| AbiError::MalformedSignature(format!("{}: {}", s, e)))?;
        if function.name.is_empty() {
            return Err(AbiError::MalformedSignature(s.to_string()));
        }

        // store canonical type names so `uint` hashes as `uint256`
        for param in function.inputs.iter_mut() {
            let resolved = param
                .resolve()
                .map_err(|_| AbiError::UnsupportedType(param.ty.clone()))?;
            if param.components.is_empty() {
                param.ty = resolved.sol_type_name().into_owned();
            }
        }
        Ok(Self(function))
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Serialize for MethodSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for MethodSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
