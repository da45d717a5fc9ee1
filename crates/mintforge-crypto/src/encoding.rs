//! Hex key parsing and EIP-55 address encoding

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid character in input")]
    InvalidCharacter,
    #[error("Invalid length (expected {expected} hex digits, got {actual})")]
    InvalidLength { expected: usize, actual: usize },
}

/// Strip an optional lowercase `0x` prefix
pub fn strip_0x(input: &str) -> &str {
    input.strip_prefix("0x").unwrap_or(input)
}

/// Decode a 32-byte value from 64 hex digits, with or without `0x`
pub fn decode_hex32(input: &str) -> Result<[u8; 32], EncodingError> {
    let digits = strip_0x(input);
    if digits.len() != 64 {
        return Err(EncodingError::InvalidLength {
            expected: 64,
            actual: digits.len(),
        });
    }

    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out).map_err(|_| EncodingError::InvalidCharacter)?;
    Ok(out)
}

/// EIP-55 checksum encoding for Ethereum addresses
pub fn eip55_checksum(address: &[u8; 20]) -> String {
    use crate::hash::keccak256;

    let hex_addr = hex::encode(address);
    let hash = keccak256(hex_addr.as_bytes());

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (i, c) in hex_addr.chars().enumerate() {
        let hash_nibble = if i % 2 == 0 {
            (hash[i / 2] >> 4) & 0x0F
        } else {
            hash[i / 2] & 0x0F
        };

        if hash_nibble >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex32_with_and_without_prefix() {
        let raw = "00000000000000000000000000000000000000000000000000000000000000ff";
        let bare = decode_hex32(raw).unwrap();
        let prefixed = decode_hex32(&format!("0x{raw}")).unwrap();
        assert_eq!(bare, prefixed);
        assert_eq!(bare[31], 0xff);
    }

    #[test]
    fn test_decode_hex32_rejects_bad_input() {
        assert_eq!(
            decode_hex32("abcd"),
            Err(EncodingError::InvalidLength { expected: 64, actual: 4 })
        );
        let bad = "zz".repeat(32);
        assert_eq!(decode_hex32(&bad), Err(EncodingError::InvalidCharacter));
    }

    #[test]
    fn test_eip55_checksum() {
        let addr = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let mut addr_arr = [0u8; 20];
        addr_arr.copy_from_slice(&addr);

        let checksummed = eip55_checksum(&addr_arr);
        assert_eq!(checksummed, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }
}
