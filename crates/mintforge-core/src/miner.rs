//! Local proof-of-work search worker

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mintforge_crypto::{hash::keccak256_parts, hex, Secp256k1Keypair};
use mintforge_difficulty::Difficulty;

use crate::worker::{SearchWorker, TelemetrySink, WorkerError, WorkerInput};

/// Search tuning for [`HashSearchWorker`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Candidates hashed between cancellation checks
    pub batch_size: usize,
    /// Minimum time between rate samples
    pub report_interval: Duration,
    /// Stop after this many matches (0 = unlimited)
    pub max_solutions: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            report_interval: Duration::from_secs(1),
            max_solutions: 0,
        }
    }
}

/// Mint inscription with everything but the nonce filled in
#[derive(Debug, Clone)]
struct PayloadTemplate {
    head: String,
}

impl PayloadTemplate {
    const TAIL: &'static str = "\"}";

    fn new(tick: &str, amount: f64) -> Self {
        // Escapes quotes and control characters in the tick
        let tick = serde_json::Value::String(tick.to_string()).to_string();
        let head = format!(
            "data:application/json,{{\"p\":\"ierc-20\",\"op\":\"mint\",\"tick\":{},\"amt\":\"{}\",\"nonce\":\"",
            tick, amount
        );
        Self { head }
    }

    fn render_into(&self, buf: &mut String, nonce: u64) {
        buf.clear();
        buf.push_str(&self.head);
        let _ = write!(buf, "{}", nonce);
        buf.push_str(Self::TAIL);
    }
}

/// Brute-forces mint payload nonces until the candidate hash meets the
/// difficulty prefix.
///
/// The candidate hash is `keccak256(chain_id_be || address || payload)`. A
/// match is reported as a log line; submitting it on-chain is left to
/// whatever consumes the log.
#[derive(Debug, Clone, Default)]
pub struct HashSearchWorker {
    config: MinerConfig,
}

impl HashSearchWorker {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }
}

impl SearchWorker for HashSearchWorker {
    fn run(&self, input: WorkerInput, sink: &TelemetrySink) -> Result<(), WorkerError> {
        let difficulty = Difficulty::parse(&input.difficulty)?;
        let keypair = Secp256k1Keypair::from_hex(&input.private_key)?;
        let address = keypair.address_bytes();
        let chain_id = input.environment.chain_id().to_be_bytes();
        let template = PayloadTemplate::new(&input.tick, input.amount);

        info!(
            worker = input.index,
            tick = %input.tick,
            address = %keypair.address(),
            environment = %input.environment,
            rpc = %input.rpc_or_default(),
            gas_premium = input.gas_premium,
            difficulty = %difficulty,
            "Mint worker started"
        );

        let batch_size = self.config.batch_size.max(1);
        let mut nonce: u64 = rand::random();
        let mut payload = String::with_capacity(template.head.len() + 24);
        let mut solutions = 0u64;
        let mut window_start = Instant::now();
        let mut window_count = 0u64;

        loop {
            if sink.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }

            for _ in 0..batch_size {
                template.render_into(&mut payload, nonce);
                let hash = keccak256_parts(&[&chain_id[..], &address[..], payload.as_bytes()]);
                window_count += 1;

                if difficulty.matches(&hash) {
                    solutions += 1;
                    debug!(worker = input.index, nonce, "Found solution");
                    sink.log(format!(
                        "Minted {} nonce={} hash=0x{}",
                        input.tick,
                        nonce,
                        hex::encode(hash)
                    ))?;

                    if self.config.max_solutions > 0 && solutions >= self.config.max_solutions {
                        let elapsed = window_start.elapsed().as_secs_f64();
                        if elapsed > 0.0 {
                            sink.rate(window_count as f64 / elapsed)?;
                        }
                        return Ok(());
                    }
                }
                nonce = nonce.wrapping_add(1);
            }

            let elapsed = window_start.elapsed();
            if elapsed >= self.config.report_interval && !elapsed.is_zero() {
                sink.rate(window_count as f64 / elapsed.as_secs_f64())?;
                window_start = Instant::now();
                window_count = 0;
            }
        }
    }
}
