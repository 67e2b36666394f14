//! JSON report output
//!
//! Serializes an [`AggregateReport`] into a self-describing JSON document for
//! the test-matrix driver and later analysis. Durations and rates carry both
//! a machine value and a human-readable string.

use crate::protocol::Failure;
use crate::stats::{AggregateReport, LatencySummary, PhaseStats};
use crate::util::time::{format_duration, format_throughput, to_mb};
use crate::workflow::{DownloadOutcome, UploadOutcome, WorkerResult};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub seconds: f64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            seconds: d.as_secs_f64(),
            human: format_duration(d),
        }
    }
}

/// Throughput in bytes/sec, MB/s and human-readable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonThroughput {
    pub bytes_per_sec: f64,
    pub mb_per_sec: f64,
    pub human: String,
}

impl JsonThroughput {
    pub fn new(bytes_per_sec: f64) -> Self {
        Self {
            bytes_per_sec,
            mb_per_sec: to_mb(bytes_per_sec),
            human: format_throughput(bytes_per_sec),
        }
    }
}

/// Transfer-time distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLatency {
    pub count: u64,
    pub min: JsonDuration,
    pub mean: JsonDuration,
    pub p50: JsonDuration,
    pub p90: JsonDuration,
    pub p99: JsonDuration,
    pub max: JsonDuration,
}

impl From<&LatencySummary> for JsonLatency {
    fn from(summary: &LatencySummary) -> Self {
        Self {
            count: summary.count,
            min: JsonDuration::from_duration(summary.min),
            mean: JsonDuration::from_duration(summary.mean),
            p50: JsonDuration::from_duration(summary.p50),
            p90: JsonDuration::from_duration(summary.p90),
            p99: JsonDuration::from_duration(summary.p99),
            max: JsonDuration::from_duration(summary.max),
        }
    }
}

/// One phase of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPhase {
    pub successful: usize,
    pub failed: usize,
    /// Slowest counted transfer
    pub total_time: JsonDuration,
    pub throughput: JsonThroughput,
    pub total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<JsonLatency>,
}

impl From<&PhaseStats> for JsonPhase {
    fn from(stats: &PhaseStats) -> Self {
        Self {
            successful: stats.successful,
            failed: stats.failed,
            total_time: JsonDuration::from_duration(stats.max_elapsed),
            throughput: JsonThroughput::new(stats.throughput_bytes_per_sec),
            total_bytes: stats.total_bytes,
            latency: stats.latency.as_ref().map(JsonLatency::from),
        }
    }
}

/// Run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTestInfo {
    pub start_time: String,
    pub wall_time: JsonDuration,
    pub file_size: u64,
    pub file_size_mb: f64,
    pub workers: usize,
    pub pool_kind: String,
}

/// One worker's outcome, flattened for readability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWorkerResult {
    pub worker_id: usize,
    pub filename: String,
    pub upload_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<JsonDuration>,
    pub download_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_time: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl From<&WorkerResult> for JsonWorkerResult {
    fn from(result: &WorkerResult) -> Self {
        let upload_failure = match &result.upload {
            Some(UploadOutcome::Failed(failure)) => Some(failure.clone()),
            _ => None,
        };
        let download_failure = result.download.as_ref().and_then(DownloadOutcome::failure).cloned();
        let data_valid = match &result.download {
            Some(DownloadOutcome::Completed {
                content_matches_prefix,
                ..
            }) => Some(*content_matches_prefix),
            _ => None,
        };

        Self {
            worker_id: result.worker_id,
            filename: result.filename.clone(),
            upload_success: result.upload_succeeded(),
            upload_time: result
                .upload
                .as_ref()
                .and_then(UploadOutcome::elapsed)
                .map(JsonDuration::from_duration),
            download_success: result.download_succeeded(),
            download_time: result
                .download
                .as_ref()
                .and_then(DownloadOutcome::elapsed)
                .map(JsonDuration::from_duration),
            data_valid,
            // First failure that explains the outcome
            error: result.error.clone().or(upload_failure).or(download_failure),
        }
    }
}

/// Complete JSON report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub test_info: JsonTestInfo,
    pub upload: JsonPhase,
    pub download: JsonPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_worker: Option<Vec<JsonWorkerResult>>,
}

/// Build the JSON document for a report
///
/// `per_worker` results are included in the given order when present.
pub fn build_report(report: &AggregateReport, per_worker: Option<&[&WorkerResult]>) -> JsonReport {
    JsonReport {
        test_info: JsonTestInfo {
            start_time: report.started_at.to_rfc3339(),
            wall_time: JsonDuration::from_duration(report.wall_time),
            file_size: report.file_size,
            file_size_mb: to_mb(report.file_size as f64),
            workers: report.worker_count,
            pool_kind: report.pool_kind.to_string(),
        },
        upload: JsonPhase::from(&report.upload),
        download: JsonPhase::from(&report.download),
        per_worker: per_worker.map(|results| {
            results
                .iter()
                .map(|r| JsonWorkerResult::from(*r))
                .collect()
        }),
    }
}

/// Write a JSON report to `output_path`
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output file {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(&mut writer, report)?;
    } else {
        serde_json::to_writer(&mut writer, report)?;
    }
    writer.flush()?;

    Ok(())
}
