//! MintForge Core Engine
//!
//! Runs a configurable number of proof-of-work mint workers in parallel and
//! folds their telemetry into one live view.

mod config;
mod miner;
mod orchestrator;
mod telemetry;
mod worker;

pub use config::{
    validate, ConfigError, Environment, RawRunInput, RunConfiguration, DEFAULT_GAS_PREMIUM,
    MIN_GAS_PREMIUM,
};
pub use miner::{HashSearchWorker, MinerConfig};
pub use orchestrator::{Orchestrator, OrchestratorError, WorkerHandle};
pub use telemetry::{LogEntry, LogLevel, TelemetryAggregator, TelemetrySnapshot};
pub use worker::{SearchWorker, TelemetryEvent, TelemetrySink, WorkerError, WorkerInput};

// Re-exports for convenience
pub use mintforge_crypto::Secp256k1Keypair;
pub use mintforge_difficulty::{
    estimate_time_50pct, format_difficulty, format_duration, format_rate, probability_found,
    Difficulty,
};
