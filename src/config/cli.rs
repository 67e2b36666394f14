//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Run a test (default) - spawn workers and report statistics
    Run,
    /// Worker mode - run one workflow and print its result as JSON
    #[value(hide = true)]
    Worker,
}

/// Concurrency strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PoolType {
    /// Async tasks in one process sharing one payload
    Shared,
    /// One child process per worker
    Process,
}

/// filepulse - concurrent load generator for line-delimited file servers
#[derive(Parser, Debug)]
#[command(name = "filepulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: run or worker
    #[arg(long, value_enum, default_value = "run")]
    pub mode: ExecutionMode,

    // === Server Options ===
    /// Server address (host:port)
    #[arg(long, env = "FILEPULSE_SERVER")]
    pub server: Option<String>,

    /// Deadline for each protocol call (e.g., 30s, 500ms, 0 to disable)
    #[arg(long)]
    pub timeout: Option<String>,

    // === Workload Options ===
    /// Payload size per worker (e.g., 10M, 512k, 1G)
    #[arg(short = 's', long)]
    pub file_size: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Concurrency strategy
    #[arg(long, value_enum)]
    pub pool: Option<PoolType>,

    /// Number of leading bytes compared after download
    #[arg(long, conflicts_with = "full_verify")]
    pub verify_prefix: Option<usize>,

    /// Compare every byte of each download
    #[arg(long)]
    pub full_verify: bool,

    // === Run Options ===
    /// Seed for payload generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Prefix for upload filenames
    #[arg(long)]
    pub tag: Option<String>,

    /// Worker id (worker mode only)
    #[arg(long, hide = true)]
    pub worker_id: Option<usize>,

    // === Output Options ===
    /// Write a JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Append a result row to this CSV file
    #[arg(long)]
    pub csv_output: Option<PathBuf>,

    /// Include per-worker results in the report
    #[arg(long)]
    pub per_worker_output: bool,

    // === Misc ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print the configuration and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.verify_prefix == Some(0) {
            anyhow::bail!("verify_prefix must be at least 1");
        }

        if let Some(tag) = &self.tag {
            if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                anyhow::bail!("tag must be non-empty and contain no whitespace");
            }
        }

        if self.mode == ExecutionMode::Worker {
            // Worker mode is only launched by the process pool, which always
            // passes these
            if self.worker_id.is_none() {
                anyhow::bail!("--worker-id is required in worker mode");
            }
            if self.seed.is_none() {
                anyhow::bail!("--seed is required in worker mode");
            }
            if self.server.is_none() || self.file_size.is_none() {
                anyhow::bail!("--server and --file-size are required in worker mode");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("filepulse").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--server", "localhost:6666"]);
        assert_eq!(cli.mode, ExecutionMode::Run);
        assert_eq!(cli.pool, None);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_run_flags() {
        let cli = parse(&[
            "--server", "h:1", "-s", "10M", "-w", "5", "--pool", "process", "--timeout", "500ms",
            "--json-output", "out.json",
        ]);
        assert_eq!(cli.file_size.as_deref(), Some("10M"));
        assert_eq!(cli.workers, Some(5));
        assert_eq!(cli.pool, Some(PoolType::Process));
        assert_eq!(cli.json_output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_verify_flags_conflict() {
        let result = Cli::try_parse_from(["filepulse", "--verify-prefix", "4", "--full-verify"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(parse(&["-w", "0"]).validate().is_err());
    }

    #[test]
    fn test_worker_mode_requires_id_and_seed() {
        let cli = parse(&["--mode", "worker", "--server", "h:1", "--file-size", "1024", "--seed", "1"]);
        assert!(cli.validate().is_err());

        let cli = parse(&[
            "--mode", "worker", "--server", "h:1", "--file-size", "1024", "--seed", "1",
            "--worker-id", "3",
        ]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.worker_id, Some(3));
    }
}
