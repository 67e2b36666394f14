//! Configuration
//!
//! A run is described by a [`Config`], built from an optional TOML file with
//! command-line flags layered on top (CLI wins). The validated config yields
//! the [`WorkflowSpec`] every worker runs.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::pool::PoolKind;
use crate::workflow::{VerifyMode, WorkflowSpec, DEFAULT_PREFIX_LEN};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// What each run does
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Report destinations
    #[serde(default)]
    pub output: OutputConfig,

    /// Run-wide settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Verification mode selected by the workload settings
    pub fn verify_mode(&self) -> VerifyMode {
        if self.workload.full_verify {
            VerifyMode::Full
        } else {
            VerifyMode::Prefix(self.workload.verify_prefix)
        }
    }

    /// Per-worker settings for a run with the given fixture seed
    pub fn workflow_spec(&self, seed: u64) -> WorkflowSpec {
        WorkflowSpec {
            server: self.server.address.clone(),
            file_size: self.workload.file_size,
            timeout: self.server.timeout(),
            verify: self.verify_mode(),
            seed,
            tag: self.runtime.tag.clone(),
        }
    }
}

/// Server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// host:port of the file server
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-call deadline (`"30s"`, `"500ms"` or whole seconds); zero disables it
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout: default_timeout(),
        }
    }
}

/// Workload settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Payload size in bytes (`"10M"` style strings accepted)
    #[serde(default = "default_file_size", deserialize_with = "deserialize_size")]
    pub file_size: u64,

    /// Concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Concurrency strategy
    #[serde(default)]
    pub pool: PoolKind,

    /// Leading bytes compared after download
    #[serde(default = "default_verify_prefix")]
    pub verify_prefix: usize,

    /// Compare the whole download instead of a prefix
    #[serde(default)]
    pub full_verify: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            file_size: default_file_size(),
            workers: default_workers(),
            pool: PoolKind::default(),
            verify_prefix: default_verify_prefix(),
            full_verify: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file
    pub json_output: Option<PathBuf>,

    /// CSV results file (one row appended per run)
    pub csv_output: Option<PathBuf>,

    /// Include per-worker results in text and JSON output
    #[serde(default)]
    pub per_worker_output: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Fixture seed; drawn from entropy when unset
    pub seed: Option<u64>,

    /// Prefix for upload filenames, so concurrent runs don't collide
    pub tag: Option<String>,

    /// Print the configuration and exit
    #[serde(default)]
    pub dry_run: bool,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

fn default_address() -> String {
    "127.0.0.1:6666".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_workers() -> usize {
    1
}

fn default_verify_prefix() -> usize {
    DEFAULT_PREFIX_LEN
}

/// Accept either a byte count or a size string such as `"10M"`
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Bytes(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Bytes(bytes) => Ok(bytes),
        Size::Text(text) => cli_convert::parse_size(&text).map_err(serde::de::Error::custom),
    }
}

/// Accept either whole seconds or a duration string such as `"500ms"`
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timeout {
        Seconds(u64),
        Text(String),
    }

    match Timeout::deserialize(deserializer)? {
        Timeout::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Timeout::Text(text) => cli_convert::parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
