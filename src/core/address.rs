//! Account addresses
//!
//! The 20-byte [`Address`] is `alloy-primitives`'. User input goes through
//! [`parse_address`], which insists on the `0x` prefix and rejects mixed-case
//! input whose EIP-55 checksum does not match.

use thiserror::Error;

pub use alloy_primitives::Address;

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("Address must be 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("Address contains invalid hex: {0}")]
    InvalidHex(String),
    #[error("Address checksum mismatch: {0}")]
    BadChecksum(String),
}

/// Parse an address; all-lowercase, all-uppercase or correctly checksummed
pub fn parse_address(s: &str) -> Result<Address, AddressError> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
    if body.len() != 40 {
        return Err(AddressError::InvalidLength(body.len()));
    }

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(s, None).map_err(|e| match e {
            alloy_primitives::AddressError::InvalidChecksum => {
                AddressError::BadChecksum(s.to_string())
            }
            other => AddressError::InvalidHex(other.to_string()),
        });
    }

    s.parse::<Address>()
        .map_err(|e| AddressError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from EIP-55
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for expected in CHECKSUMMED {
            let address = parse_address(expected).unwrap();
            assert_eq!(address.to_checksum(None), expected);
            assert_eq!(address.to_string(), expected);
        }
    }

    #[test]
    fn test_lowercase_accepted() {
        let lower = CHECKSUMMED[0].to_lowercase();
        let address = parse_address(&lower).unwrap();
        assert_eq!(address.to_checksum(None), CHECKSUMMED[0]);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // flip the case of one letter
        let bad = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(matches!(
            parse_address(bad),
            Err(AddressError::BadChecksum(_))
        ));
    }

    #[test]
    fn test_malformed_addresses() {
        assert!(matches!(
            parse_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::MissingPrefix(_))
        ));
        assert!(matches!(
            parse_address("0x1234"),
            Err(AddressError::InvalidLength(4))
        ));
        assert!(matches!(
            parse_address("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_word_padding() {
        let address = parse_address(CHECKSUMMED[1]).unwrap();
        let word = address.into_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], address.as_slice());
    }

    #[test]
    fn test_serde_round_trip() {
        let address = parse_address(CHECKSUMMED[2]).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json.to_lowercase(), format!("\"{}\"", CHECKSUMMED[2].to_lowercase()));
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), address);
    }
}
