//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{convert_pool_type, parse_duration, parse_size};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Server
    if let Some(server) = &cli.server {
        config.server.address = server.clone();
    }
    if let Some(timeout) = &cli.timeout {
        config.server.timeout = parse_duration(timeout)?;
    }

    // Workload
    if let Some(size) = &cli.file_size {
        config.workload.file_size = parse_size(size)?;
    }
    if let Some(workers) = cli.workers {
        config.workload.workers = workers;
    }
    if let Some(pool) = cli.pool {
        config.workload.pool = convert_pool_type(pool);
    }
    if let Some(prefix) = cli.verify_prefix {
        config.workload.verify_prefix = prefix;
        config.workload.full_verify = false;
    }
    if cli.full_verify {
        config.workload.full_verify = true;
    }

    // Output
    if let Some(path) = &cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(path) = &cli.csv_output {
        config.output.csv_output = Some(path.clone());
    }
    if cli.per_worker_output {
        config.output.per_worker_output = true;
    }

    // Runtime
    if cli.seed.is_some() {
        config.runtime.seed = cli.seed;
    }
    if let Some(tag) = &cli.tag {
        config.runtime.tag = Some(tag.clone());
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}

/// Build the effective configuration: the `-c` file if given, else defaults,
/// with CLI flags applied on top
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}
