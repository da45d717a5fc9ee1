//! MintForge Crypto Primitives
//!
//! Key handling and hashing used by the mint search workers.

pub mod secp256k1;
pub mod hash;
pub mod encoding;

pub use self::secp256k1::{KeyError, Secp256k1Keypair};

// Re-export for downstream hex handling
pub use hex;
