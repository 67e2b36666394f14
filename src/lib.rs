//! FilePulse - concurrent load generator for line-framed file servers
//!
//! FilePulse drives many simultaneous upload → list → download workflows
//! against a file server speaking a simple CRLF-framed text protocol, checks
//! every transfer, and reports aggregate success and throughput figures.
//!
//! # Architecture
//!
//! - **Protocol**: wire codec, one-connection-per-command transport, scriptable mock server
//! - **Client**: `list` / `fetch` / `store` over the transport
//! - **Workflow**: one upload-verify-download cycle per worker
//! - **Pools**: shared (async tasks) and process (child per worker) strategies
//! - **Stats**: bottleneck throughput and transfer-time histograms
//! - **Output**: text report, JSON report, CSV row per run

pub mod client;
pub mod config;
pub mod output;
pub mod pool;
pub mod protocol;
pub mod stats;
pub mod util;
pub mod workflow;

// Re-export commonly used types
pub use client::ProtocolClient;
pub use config::Config;
pub use pool::{Orchestrator, PoolKind};
pub use workflow::{TransferWorkflow, WorkerResult, WorkflowSpec};

/// Result type used throughout FilePulse
pub type Result<T> = anyhow::Result<T>;
