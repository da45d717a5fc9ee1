//! secp256k1 key handling for the minting account

use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::encoding::{decode_hex32, eip55_checksum, EncodingError};
use crate::hash::keccak256;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Malformed private key: {0}")]
    Malformed(#[from] EncodingError),
    #[error("Private key is not a valid secp256k1 scalar")]
    InvalidPrivateKey,
}

/// A secp256k1 keypair
#[derive(Clone)]
pub struct Secp256k1Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Secp256k1Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret_key = SecretKey::random(&mut OsRng);
        let public_key = secret_key.public_key();
        Self { secret_key, public_key }
    }

    /// Create from raw 32-byte private key
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let secret_key =
            SecretKey::from_bytes(bytes.into()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = secret_key.public_key();
        Ok(Self { secret_key, public_key })
    }

    /// Create from 64 hex digits, with or without `0x`
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex32(input)?;
        Self::from_bytes(&bytes)
    }

    /// Get the private key as bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret_key.to_bytes().into()
    }

    /// Private key as `0x`-prefixed lowercase hex
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.private_key_bytes()))
    }

    /// Get just the X and Y coordinates (64 bytes, no prefix)
    pub fn public_key_xy(&self) -> [u8; 64] {
        use k256::elliptic_curve::sec1::ToEncodedPoint;
        let point = self.public_key.to_encoded_point(false);
        let mut result = [0u8; 64];
        result.copy_from_slice(&point.as_bytes()[1..65]);
        result
    }

    /// EVM account bytes: last 20 bytes of keccak256(pubkey_xy)
    pub fn address_bytes(&self) -> [u8; 20] {
        let hash = keccak256(&self.public_key_xy());
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..32]);
        address
    }

    /// EIP-55 checksummed account address
    pub fn address(&self) -> String {
        eip55_checksum(&self.address_bytes())
    }
}

impl std::fmt::Debug for Secp256k1Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret half
        f.debug_struct("Secp256k1Keypair")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_keypair_generation() {
        let kp = Secp256k1Keypair::generate();
        assert_eq!(kp.private_key_bytes().len(), 32);
        assert!(kp.address().starts_with("0x"));
        assert_eq!(kp.address().len(), 42);
    }

    #[test]
    fn test_known_vector() {
        // Known address for privkey=1
        let kp = Secp256k1Keypair::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            kp.address().to_lowercase(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        assert_eq!(kp.private_key_hex(), format!("0x{KEY_ONE}"));
    }

    #[test]
    fn test_zero_key_rejected() {
        let zero = "0".repeat(64);
        assert!(matches!(
            Secp256k1Keypair::from_hex(&zero),
            Err(KeyError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_malformed_key_rejected() {
        assert!(matches!(
            Secp256k1Keypair::from_hex("0x1234"),
            Err(KeyError::Malformed(_))
        ));
    }
}
