//! Hash functions for mint candidates and address derivation

use sha3::{Digest, Keccak256};

/// Keccak-256 (used in Ethereum, NOT SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 over several slices without concatenating them first
pub fn keccak256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256() {
        // Empty input
        let result = keccak256(b"");
        assert_eq!(
            hex::encode(result),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_parts_matches_concatenation() {
        let joined = keccak256(b"data:application/json,{}");
        let split = keccak256_parts(&[b"data:", b"application/json,", b"{}"]);
        assert_eq!(joined, split);
    }
}
