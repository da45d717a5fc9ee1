//! Difficulty threshold parsing and hash matching

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest prefix a 32-byte hash can satisfy
pub const MAX_DIGITS: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DifficultyError {
    #[error("Difficulty is empty")]
    Empty,
    #[error("Difficulty contains invalid character '{0}' (valid: 0-9, a-f)")]
    InvalidCharacter(char),
    #[error("Difficulty too long (max {0} hex digits)")]
    TooLong(usize),
}

/// A required hex prefix on a candidate hash.
///
/// `0x00000` means the first five hex digits of the hash must be zero.
/// Matching is case-insensitive; the prefix is stored as nibble values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty {
    nibbles: Vec<u8>,
}

impl Difficulty {
    /// Parse a threshold such as `0x0000` or `0000`
    pub fn parse(input: &str) -> Result<Self, DifficultyError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(DifficultyError::Empty);
        }
        if digits.len() > MAX_DIGITS {
            return Err(DifficultyError::TooLong(MAX_DIGITS));
        }

        let nibbles = digits
            .chars()
            .map(|c| {
                c.to_digit(16)
                    .map(|d| d as u8)
                    .ok_or(DifficultyError::InvalidCharacter(c))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { nibbles })
    }

    /// Number of hex digits that must match
    pub fn digits(&self) -> usize {
        self.nibbles.len()
    }

    /// Check whether a hash satisfies the threshold
    pub fn matches(&self, hash: &[u8; 32]) -> bool {
        self.nibbles.iter().enumerate().all(|(i, &want)| {
            let byte = hash[i / 2];
            let got = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            got == want
        })
    }

    /// Expected number of candidates per match (16^digits)
    pub fn expected_attempts(&self) -> f64 {
        16f64.powi(self.nibbles.len() as i32)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for n in &self.nibbles {
            write!(f, "{:x}", n)?;
        }
        Ok(())
    }
}

impl FromStr for Difficulty {
    type Err = DifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
