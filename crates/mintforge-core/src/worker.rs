//! Message contract between the orchestrator and search workers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mintforge_crypto::KeyError;
use mintforge_difficulty::DifficultyError;

use crate::config::{Environment, RunConfiguration};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Run was cancelled")]
    Cancelled,
    #[error("Telemetry channel closed")]
    ChannelClosed,
    #[error("Invalid difficulty: {0}")]
    Difficulty(#[from] DifficultyError),
    #[error("Invalid private key: {0}")]
    PrivateKey(#[from] KeyError),
    #[error("{0}")]
    Failed(String),
}

/// Spawn-time input, delivered exactly once to each worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInput {
    pub index: usize,
    pub private_key: String,
    pub rpc: Option<String>,
    pub tick: String,
    pub amount: f64,
    pub difficulty: String,
    pub gas_premium: u32,
    pub environment: Environment,
}

impl WorkerInput {
    /// Copy of the run configuration for worker `index`
    pub fn new(config: &RunConfiguration, index: usize) -> Self {
        Self {
            index,
            private_key: config.private_key().to_string(),
            rpc: config.rpc().map(str::to_string),
            tick: config.tick().to_string(),
            amount: config.amount(),
            difficulty: config.difficulty().to_string(),
            gas_premium: config.gas_premium(),
            environment: config.environment(),
        }
    }

    /// RPC endpoint, falling back to the environment's public endpoint
    pub fn rpc_or_default(&self) -> &str {
        self.rpc
            .as_deref()
            .unwrap_or_else(|| self.environment.default_rpc())
    }
}

/// One message from a worker: a log line, a rate sample, both, or neither
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Marks the log line as an error
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl TelemetryEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self {
            log: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            log: Some(message.into()),
            error: true,
            ..Default::default()
        }
    }

    pub fn rate(rate: f64) -> Self {
        Self {
            rate: Some(rate),
            ..Default::default()
        }
    }

    /// Attach a rate sample to this event
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }
}

/// Event tagged with the run and worker it came from
#[derive(Debug)]
pub(crate) struct Envelope {
    pub generation: u64,
    pub index: usize,
    pub event: TelemetryEvent,
}

/// Worker-side end of the telemetry channel
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    index: usize,
    generation: u64,
    cancel: Arc<AtomicBool>,
    tx: Sender<Envelope>,
}

impl TelemetrySink {
    pub(crate) fn new(
        index: usize,
        generation: u64,
        cancel: Arc<AtomicBool>,
        tx: Sender<Envelope>,
    ) -> Self {
        Self {
            index,
            generation,
            cancel,
            tx,
        }
    }

    /// Ordinal of the worker owning this sink
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the orchestrator has terminated this worker
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Send one event to the orchestrator
    pub fn emit(&self, event: TelemetryEvent) -> Result<(), WorkerError> {
        if self.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }
        self.tx
            .send(Envelope {
                generation: self.generation,
                index: self.index,
                event,
            })
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn log(&self, message: impl Into<String>) -> Result<(), WorkerError> {
        self.emit(TelemetryEvent::log(message))
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), WorkerError> {
        self.emit(TelemetryEvent::error(message))
    }

    pub fn rate(&self, rate: f64) -> Result<(), WorkerError> {
        self.emit(TelemetryEvent::rate(rate))
    }
}

/// A search worker.
///
/// `run` is called once per spawned worker on its own thread and may block
/// for as long as it likes. Implementations should poll
/// [`TelemetrySink::is_cancelled`] between units of work and return once it
/// is set; returning `Err(WorkerError::Cancelled)` is a normal exit.
pub trait SearchWorker: Send + Sync {
    fn run(&self, input: WorkerInput, sink: &TelemetrySink) -> Result<(), WorkerError>;
}

impl<F> SearchWorker for F
where
    F: Fn(WorkerInput, &TelemetrySink) -> Result<(), WorkerError> + Send + Sync,
{
    fn run(&self, input: WorkerInput, sink: &TelemetrySink) -> Result<(), WorkerError> {
        self(input, sink)
    }
}
