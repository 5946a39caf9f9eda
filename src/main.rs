//! circuit-gate: inspect and exercise circuit breaker configurations.
//!
//! # Commands
//! ```text
//! check     load + validate a config, build every breaker, print snapshots
//! simulate  drive one breaker with randomly failing calls and report
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use circuit_gate::config::watcher::ConfigWatcher;
use circuit_gate::config::{load_config, AppConfig};
use circuit_gate::lifecycle::signals::spawn_signal_handler;
use circuit_gate::lifecycle::Shutdown;
use circuit_gate::observability::logging::init_logging;
use circuit_gate::observability::metrics::init_metrics;
use circuit_gate::{
    BreakerSnapshot, CallError, CircuitBreakerMetrics, CircuitBreakerRegistry, NoopMetrics, PredicateRegistry,
    PrometheusMetrics,
};

#[derive(Parser)]
#[command(name = "circuit-gate")]
#[command(about = "Inspect and exercise circuit breaker configurations", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "circuit-gate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print every breaker
    Check,
    /// Drive a breaker with simulated calls
    Simulate {
        /// Breaker to exercise (created from defaults if undeclared)
        #[arg(short, long)]
        breaker: String,

        /// Probability that a simulated call fails
        #[arg(short, long, default_value_t = 0.5, value_parser = parse_probability)]
        failure_rate: f64,

        /// Number of call attempts
        #[arg(short = 'n', long, default_value_t = 1_000)]
        calls: u64,

        /// Delay between attempts in milliseconds
        #[arg(short, long, default_value_t = 10)]
        interval_ms: u64,

        /// Apply config file changes while running
        #[arg(short, long)]
        watch: bool,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("simulated failure")]
struct SimulatedFailure;

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    attempted: u64,
    succeeded: u64,
    failed: u64,
    rejected: u64,
    breaker: Option<BreakerSnapshot>,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not within 0.0..=1.0"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    init_logging(&config.observability.log_level);

    tracing::info!(
        path = ?cli.config,
        breakers = config.breakers.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Check => check(&config),
        Commands::Simulate {
            breaker,
            failure_rate,
            calls,
            interval_ms,
            watch,
            seed,
        } => {
            let options = SimulateOptions {
                breaker,
                failure_rate,
                calls,
                interval: Duration::from_millis(interval_ms),
                watch,
                seed,
            };
            simulate(&cli.config, config, options).await
        }
    }
}

fn check(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let registry = CircuitBreakerRegistry::with_defaults(config)?;
    println!("{}", serde_json::to_string_pretty(&registry.snapshots())?);
    Ok(())
}

struct SimulateOptions {
    breaker: String,
    failure_rate: f64,
    calls: u64,
    interval: Duration,
    watch: bool,
    seed: Option<u64>,
}

async fn simulate(path: &Path, config: AppConfig, options: SimulateOptions) -> Result<(), Box<dyn Error>> {
    let sink: Arc<dyn CircuitBreakerMetrics> = if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                init_metrics(addr);
                Arc::new(PrometheusMetrics)
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
                Arc::new(NoopMetrics)
            }
        }
    } else {
        Arc::new(NoopMetrics)
    };

    let registry = Arc::new(CircuitBreakerRegistry::from_config(
        &config,
        PredicateRegistry::default(),
        sink,
    )?);

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    // keep the watcher handle alive for the whole run
    let _watcher = if options.watch {
        Some(ConfigWatcher::new(path, config.clone()).spawn(registry.clone(), &shutdown)?)
    } else {
        None
    };

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut ticker = tokio::time::interval(options.interval);
    let mut stop = shutdown.subscribe();
    let mut report = SimulationReport::default();

    tracing::info!(
        breaker = %options.breaker,
        failure_rate = options.failure_rate,
        calls = options.calls,
        "Simulation starting"
    );

    for _ in 0..options.calls {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.recv() => {
                tracing::info!("Simulation interrupted");
                break;
            }
        }

        // looked up every iteration so reloads take effect
        let breaker = registry.get_or_create(&options.breaker)?;
        let fails = rng.gen_bool(options.failure_rate);

        report.attempted += 1;
        match breaker.call(|| if fails { Err(SimulatedFailure) } else { Ok(()) }) {
            Ok(()) => report.succeeded += 1,
            Err(CallError::Failed(_)) => report.failed += 1,
            Err(CallError::NotPermitted(_)) => report.rejected += 1,
        }
    }

    shutdown.trigger();
    report.breaker = registry.get(&options.breaker).map(|b| b.snapshot());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
