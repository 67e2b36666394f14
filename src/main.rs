//! FilePulse CLI entry point

use anyhow::{Context, Result};
use chrono::Utc;
use filepulse::config::cli::{Cli, ExecutionMode};
use filepulse::config::{toml::load_config, validator, Config};
use filepulse::output::{csv, json, text};
use filepulse::pool::Orchestrator;
use filepulse::stats::{RunParameters, StatisticsAggregator};
use filepulse::util::time::format_bytes;
use filepulse::workflow::{Fixture, TransferWorkflow, VerifyMode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    init_logging(&cli);

    match cli.mode {
        ExecutionMode::Run => run_test(cli),
        ExecutionMode::Worker => run_worker(cli),
    }
}

/// Log to stderr; stdout is reserved for the report (or a worker's JSON line)
fn init_logging(cli: &Cli) {
    let default_level = match (cli.mode, cli.debug) {
        (_, true) => "debug",
        (ExecutionMode::Worker, false) => "warn",
        (ExecutionMode::Run, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run one test: spawn workers, aggregate, report
fn run_test(cli: Cli) -> Result<()> {
    println!("FilePulse v{}", env!("CARGO_PKG_VERSION"));
    println!("Concurrent file server load generator");
    println!();

    let mut config = load_config(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    let seed = *config.runtime.seed.get_or_insert_with(rand::random);

    print_configuration(&config);

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    println!();
    println!("Starting test...");
    println!();

    let orchestrator = Orchestrator::new(config.workflow_spec(seed)).with_debug(config.runtime.debug);
    let worker_count = config.workload.workers;

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let started_at = Utc::now();
    let start = Instant::now();
    let results = runtime.block_on(orchestrator.run(
        worker_count,
        config.workload.file_size,
        config.workload.pool,
    ))?;
    let wall_time = start.elapsed();

    let aggregator: StatisticsAggregator = results.into_iter().collect();
    let missing = aggregator.missing_workers(worker_count);
    if !missing.is_empty() {
        warn!(?missing, "no result received from some workers");
    }

    let report = aggregator.report(&RunParameters {
        file_size: config.workload.file_size,
        worker_count,
        pool_kind: config.workload.pool,
        started_at,
        wall_time,
    });

    let sorted = aggregator.sorted_results();
    let per_worker = config.output.per_worker_output.then_some(sorted.as_slice());

    text::print_report(&report, per_worker);

    if let Some(path) = &config.output.json_output {
        let document = json::build_report(&report, per_worker);
        json::write_json_output(path, &document, true)?;
        info!(path = %path.display(), "JSON report written");
    }

    if let Some(path) = &config.output.csv_output {
        csv::append_report(path, &report)?;
        info!(path = %path.display(), "CSV row appended");
    }

    Ok(())
}

/// Run a single workflow and print its result as one JSON line
///
/// Launched by the process pool; the payload is rebuilt from the run seed so
/// every worker uploads the same bytes as in shared mode.
fn run_worker(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let worker_id = cli.worker_id.context("--worker-id is required in worker mode")?;
    let seed = config.runtime.seed.context("--seed is required in worker mode")?;
    let spec = config.workflow_spec(seed);

    let fixture = Arc::new(Fixture::generate(spec.file_size, seed));

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;
    let result = runtime.block_on(TransferWorkflow::new(worker_id, &spec, fixture).run());

    let line = serde_json::to_string(&result).context("Failed to serialize worker result")?;
    println!("{}", line);

    Ok(())
}

fn print_configuration(config: &Config) {
    println!("Configuration:");
    println!("  Server:");
    println!("    Address: {}", config.server.address);
    match config.server.timeout() {
        Some(timeout) => println!("    Timeout: {:.3}s", timeout.as_secs_f64()),
        None => println!("    Timeout: none"),
    }

    println!("  Workload:");
    println!("    File size: {}", format_bytes(config.workload.file_size));
    println!("    Workers: {}", config.workload.workers);
    println!("    Pool: {}", config.workload.pool);
    match config.verify_mode() {
        VerifyMode::Prefix(len) => println!("    Verify: first {} bytes", len),
        VerifyMode::Full => println!("    Verify: full content"),
    }

    println!("  Runtime:");
    if let Some(seed) = config.runtime.seed {
        println!("    Seed: {}", seed);
    }
    if let Some(ref tag) = config.runtime.tag {
        println!("    Tag: {}", tag);
    }

    if config.output.json_output.is_some() || config.output.csv_output.is_some() {
        println!("  Output:");
        if let Some(ref path) = config.output.json_output {
            println!("    JSON: {}", path.display());
        }
        if let Some(ref path) = config.output.csv_output {
            println!("    CSV: {}", path.display());
        }
    }
}
