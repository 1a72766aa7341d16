//! Transaction builder
//!
//! Turns a target contract, a method signature and typed arguments into an
//! immutable [`TransactionIntent`]. Building is pure: no I/O, and identical
//! inputs always yield byte-identical call data.

use crate::core::abi::{AbiError, MethodSignature, Token};
use crate::core::address::{parse_address, Address, AddressError};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building an intent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid target address: {0}")]
    InvalidTarget(#[from] AddressError),
    #[error("Encoding failed: {0}")]
    Encoding(#[from] AbiError),
}

/// An intended contract call, ready to be wrapped into a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Contract being called
    pub target: Address,
    /// Method the call data was encoded against, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodSignature>,
    /// Selector followed by ABI-encoded arguments
    #[serde(with = "crate::core::serde_helpers::hex_bytes")]
    pub data: Vec<u8>,
    /// Native currency attached to the call
    #[serde(with = "crate::core::serde_helpers::u256_string")]
    pub value: U256,
}

impl TransactionIntent {
    /// An intent known only by its raw call data
    pub fn from_call_data(target: Address, data: Vec<u8>, value: U256) -> Self {
        Self {
            target,
            method: None,
            data,
            value,
        }
    }

    /// First four bytes of the call data
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }

    /// Method signature if known, else the raw selector
    pub fn describe_call(&self) -> String {
        match (&self.method, self.selector()) {
            (Some(method), _) => method.to_string(),
            (None, Some(selector)) => format!("0x{}", hex::encode(selector)),
            (None, None) if self.data.is_empty() => "(plain transfer)".to_string(),
            (None, None) => format!("0x{}", hex::encode(&self.data)),
        }
    }
}

/// Build an intent from a textual target and method signature
pub fn build(
    target: &str,
    method: &str,
    args: &[Token],
    value: Option<U256>,
) -> Result<TransactionIntent, BuildError> {
    let target = parse_address(target)?;
    let method: MethodSignature = method.parse()?;
    let data = method.encode_call(args)?;

    Ok(TransactionIntent {
        target,
        method: Some(method),
        data,
        value: value.unwrap_or_default(),
    })
}

/// Build an intent whose arguments are given as strings, each parsed against
/// the corresponding parameter type of `method`
pub fn build_from_strings(
    target: &str,
    method: &str,
    args: &[String],
    value: Option<U256>,
) -> Result<TransactionIntent, BuildError> {
    let signature: MethodSignature = method.parse()?;
    let tokens = signature.parse_args(args)?;
    build(target, method, &tokens, value)
}

/// Step-by-step construction of an intent
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    target: String,
    method: String,
    args: Vec<Token>,
    value: U256,
}

impl TransactionBuilder {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args: Vec::new(),
            value: U256::ZERO,
        }
    }

    /// Append an argument
    pub fn arg(mut self, token: Token) -> Self {
        self.args.push(token);
        self
    }

    /// Replace all arguments
    pub fn args(mut self, tokens: Vec<Token>) -> Self {
        self.args = tokens;
        self
    }

    /// Attach native currency
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn build(&self) -> Result<TransactionIntent, BuildError> {
        build(&self.target, &self.method, &self.args, Some(self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const RECIPIENT: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    #[test]
    fn test_build_transfer() {
        let intent = TransactionBuilder::new(TOKEN, "transfer(address,uint256)")
            .arg(Token::Address(parse_address(RECIPIENT).unwrap()))
            .arg(Token::Uint(U256::from(2_000_000_000_000_000_000u128), 256))
            .build()
            .unwrap();

        assert_eq!(intent.target.to_checksum(None), TOKEN);
        assert_eq!(intent.value, U256::ZERO);
        assert_eq!(intent.describe_call(), "transfer(address,uint256)");
        assert_eq!(intent.data.len(), 4 + 64);
        assert_eq!(&intent.data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let args = vec![RECIPIENT.to_string(), "42".to_string()];
        let a = build_from_strings(TOKEN, "approve(address,uint256)", &args, None).unwrap();
        let b = build_from_strings(TOKEN, "approve(address,uint256)", &args, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_value_defaults_to_zero() {
        let intent = build(TOKEN, "deposit()", &[], None).unwrap();
        assert_eq!(intent.value, U256::ZERO);
        let funded = build(TOKEN, "deposit()", &[], Some(U256::from(5))).unwrap();
        assert_eq!(funded.value, U256::from(5));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            build("0x1234", "pause()", &[], None),
            Err(BuildError::InvalidTarget(_))
        ));
        assert!(matches!(
            build(TOKEN, "pause(", &[], None),
            Err(BuildError::Encoding(AbiError::MalformedSignature(_)))
        ));
        assert!(matches!(
            build_from_strings(TOKEN, "mint(address,uint256)", &["0x12".to_string()], None),
            Err(BuildError::Encoding(AbiError::ArityMismatch { .. }))
        ));
        assert!(matches!(
            build_from_strings(
                TOKEN,
                "mint(address,uint8)",
                &[RECIPIENT.to_string(), "300".to_string()],
                None
            ),
            Err(BuildError::Encoding(AbiError::OutOfRange(_)))
        ));
        assert!(matches!(
            build(
                "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                "pause()",
                &[],
                None
            ),
            Err(BuildError::InvalidTarget(AddressError::BadChecksum(_)))
        ));
    }

    #[test]
    fn test_max_uint256_approval() {
        let intent = build_from_strings(
            TOKEN,
            "approve(address,uint256)",
            &[
                RECIPIENT.to_string(),
                U256::MAX.to_string(),
            ],
            None,
        )
        .unwrap();
        assert_eq!(&intent.data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(&intent.data[4 + 32..], &[0xffu8; 32]);
    }

    #[test]
    fn test_intent_from_call_data() {
        let built = build_from_strings(
            TOKEN,
            "approve(address,uint256)",
            &[RECIPIENT.to_string(), "1".to_string()],
            None,
        )
        .unwrap();
        let raw = TransactionIntent::from_call_data(built.target, built.data.clone(), built.value);
        assert_eq!(raw.method, None);
        assert_eq!(raw.describe_call(), "0x095ea7b3");

        let plain = TransactionIntent::from_call_data(built.target, Vec::new(), U256::from(1));
        assert_eq!(plain.selector(), None);
        assert_eq!(plain.describe_call(), "(plain transfer)");
    }

    #[test]
    fn test_intent_serde() {
        let intent = build(TOKEN, "deposit()", &[], Some(U256::from(7))).unwrap();
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["method"], "deposit()");
        assert_eq!(json["value"], "7");
        assert_eq!(json["data"], "0xd0e30db0");
        let back: TransactionIntent = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, intent);

        let mut without_method = json;
        without_method.as_object_mut().unwrap().remove("method");
        let raw: TransactionIntent = serde_json::from_value(without_method).unwrap();
        assert_eq!(raw.method, None);
        assert_eq!(raw.data, intent.data);
    }
}
