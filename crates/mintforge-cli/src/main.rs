//! MintForge CLI
//!
//! Multi-worker proof-of-work miner for inscription-style token mints.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mintforge_core::{
    estimate_time_50pct, format_difficulty, format_duration, format_rate, validate, Difficulty,
    HashSearchWorker, MinerConfig, Orchestrator, RawRunInput, Secp256k1Keypair, TelemetrySnapshot,
};
use tracing::info;

const STATUS_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "mintforge")]
#[command(author = "MintForge Team")]
#[command(version = "0.1.0")]
#[command(about = "Multi-worker proof-of-work token miner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine a token until stopped
    Mint(MintArgs),

    /// Measure hash throughput for a few seconds
    Benchmark {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Number of workers (0 = one per core)
        #[arg(short, long, default_value = "0")]
        workers: usize,
    },

    /// Print the detected core count
    Cores,
}

#[derive(Args)]
struct MintArgs {
    /// JSON file with run settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Private key, 64 hex characters with or without 0x
    #[arg(short = 'k', long)]
    private_key: Option<String>,

    /// Tick of the token to mint (e.g. ierc-m5)
    #[arg(short, long)]
    tick: Option<String>,

    /// Amount per mint
    #[arg(short, long)]
    amount: Option<String>,

    /// Difficulty, hexadecimal (e.g. 0x00000)
    #[arg(short, long)]
    difficulty: Option<String>,

    /// RPC endpoint (default: public endpoint for the environment)
    #[arg(long)]
    rpc: Option<String>,

    /// Max gas as a percentage of the startup gas price (min 100)
    #[arg(long)]
    gas_premium: Option<String>,

    /// Target environment
    #[arg(short, long)]
    env: Option<EnvArg>,

    /// Number of workers (0 = one per core)
    #[arg(short, long, default_value = "0")]
    workers: usize,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0")]
    max_time: u64,

    /// Each worker stops after this many solutions (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_solutions: u64,

    /// Print the final telemetry as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EnvArg {
    Production,
    Test,
}

impl EnvArg {
    fn as_str(self) -> &'static str {
        match self {
            EnvArg::Production => "production",
            EnvArg::Test => "test",
        }
    }
}

impl MintArgs {
    fn raw_input(&self) -> RawRunInput {
        RawRunInput {
            private_key: self.private_key.clone(),
            rpc: self.rpc.clone(),
            tick: self.tick.clone(),
            amount: self.amount.clone(),
            difficulty: self.difficulty.clone(),
            gas_premium: self.gas_premium.clone(),
            environment: self.env.map(|e| e.as_str().to_string()),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mint(args) => cmd_mint(&args)?,
        Commands::Benchmark { duration, workers } => cmd_benchmark(duration, workers)?,
        Commands::Cores => cmd_cores(),
    }

    Ok(())
}

fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

fn load_config_file(path: &Path) -> Result<RawRunInput> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Cannot parse {}", path.display()))
}

fn cmd_mint(args: &MintArgs) -> Result<()> {
    let mut raw = args.raw_input();
    if let Some(path) = &args.config {
        raw = raw.or(load_config_file(path)?);
    }

    let config = match validate(&raw) {
        Ok(config) => config,
        Err(e) => anyhow::bail!("Invalid {}: {}", e.field(), e),
    };

    let workers = resolve_workers(args.workers);
    let expected = Difficulty::parse(config.difficulty())
        .map(|d| d.expected_attempts())
        .ok();

    if !args.json {
        eprintln!("MintForge v0.1.0");
        eprintln!("Tick: {} (amount {})", config.tick(), config.amount());
        eprintln!("Difficulty: {}", config.difficulty());
        if let Some(expected) = expected {
            eprintln!("Expected hashes per mint: {}", format_difficulty(expected));
        }
        eprintln!("Environment: {} via {}", config.environment(), config.rpc_or_default());
        eprintln!("Gas premium: {}%", config.gas_premium());
        eprintln!("Workers: {}", workers);
        eprintln!();
    }

    let worker = HashSearchWorker::new(MinerConfig {
        max_solutions: args.max_solutions,
        ..Default::default()
    });
    let mut orchestrator = Orchestrator::new(worker);
    orchestrator.log("🚀 Start mining...");
    orchestrator.start(config, workers)?;

    let started = Instant::now();
    let max_time = Duration::from_secs(args.max_time);
    let mut printed = 0usize;

    loop {
        thread::sleep(STATUS_INTERVAL);
        let snapshot = orchestrator.snapshot();

        if !args.json {
            printed = print_new_logs(&snapshot, printed);
            eprint!("\r{}", status_line(&snapshot, expected));
            let _ = std::io::stderr().flush();
        }

        if !max_time.is_zero() && started.elapsed() >= max_time {
            info!("Time limit reached");
            break;
        }
        if orchestrator.active_workers() == 0 {
            info!("All workers finished");
            break;
        }
    }

    orchestrator.stop();
    let snapshot = orchestrator.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        eprintln!();
        print_summary(&snapshot, started.elapsed());
    }

    Ok(())
}

fn cmd_benchmark(duration_secs: u64, workers: usize) -> Result<()> {
    let workers = resolve_workers(workers);
    eprintln!("Benchmarking for {} seconds...", duration_secs);
    eprintln!("Workers: {}", workers);
    eprintln!();

    // Throwaway key and an unreachable difficulty keep every worker hashing
    let keypair = Secp256k1Keypair::generate();
    let config = validate(&RawRunInput {
        private_key: Some(keypair.private_key_hex()),
        tick: Some("benchmark".to_string()),
        amount: Some("1".to_string()),
        difficulty: Some(format!("0x{}", "f".repeat(64))),
        ..Default::default()
    })?;

    let mut orchestrator = Orchestrator::new(HashSearchWorker::default());
    orchestrator.start(config, workers)?;

    let started = Instant::now();
    let duration = Duration::from_secs(duration_secs);
    while started.elapsed() < duration {
        thread::sleep(STATUS_INTERVAL);
        eprint!("\r[{}]", format_rate(orchestrator.snapshot().total_rate));
        let _ = std::io::stderr().flush();
    }

    let snapshot = orchestrator.snapshot();
    orchestrator.stop();

    eprintln!("\nBenchmark complete!");
    println!("Throughput:  {}", format_rate(snapshot.total_rate));
    for (index, rate) in snapshot.rates.iter().enumerate() {
        let rate = rate.map(format_rate).unwrap_or_else(|| "-".to_string());
        println!("  worker {:<3} {}", index, rate);
    }

    Ok(())
}

fn cmd_cores() {
    println!("{}", num_cpus::get());
}

/// Print log entries added since the last call, oldest first
fn print_new_logs(snapshot: &TelemetrySnapshot, printed: usize) -> usize {
    let total = snapshot.logs.len();
    if total > printed {
        eprint!("\r");
        for entry in snapshot.logs[..total - printed].iter().rev() {
            eprintln!("{}", entry);
        }
    }
    total
}

fn status_line(snapshot: &TelemetrySnapshot, expected: Option<f64>) -> String {
    let eta = expected
        .map(|e| format_duration(estimate_time_50pct(e, snapshot.total_rate)))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "[{}][Success {}][50% in {}]",
        format_rate(snapshot.total_rate),
        snapshot.success_count,
        eta
    )
}

fn print_summary(snapshot: &TelemetrySnapshot, elapsed: Duration) {
    println!();
    println!("{:-<60}", "");
    println!("Success Count: {}", snapshot.success_count);
    println!("Last Rate:     {}", format_rate(snapshot.total_rate));
    println!("Time:          {:.2}s", elapsed.as_secs_f64());
    println!("{:-<60}", "");
}
