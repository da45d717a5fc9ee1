//! MintForge Difficulty Engine
//!
//! Hex-prefix thresholds for mint candidate hashes, plus the estimates shown
//! while a search is running.

mod threshold;
mod difficulty;

pub use threshold::{Difficulty, DifficultyError};
pub use difficulty::{
    estimate_time_50pct, format_difficulty, format_duration, format_rate, probability_found,
};
