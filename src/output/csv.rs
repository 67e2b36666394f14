//! CSV output formatting
//!
//! One row per run, appended to a results file so a test matrix (sizes x
//! worker counts x pool kinds) accumulates into a single table. The header is
//! written only when the file is new or empty.

use crate::stats::{AggregateReport, PhaseStats};
use crate::Result;
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Column names, in row order
pub const CSV_HEADER: &str = "timestamp,file_size,workers,pool_kind,\
upload_successful,upload_failed,upload_time_s,upload_throughput_mb_s,upload_total_bytes,\
download_successful,download_failed,download_time_s,download_throughput_mb_s,download_total_bytes";

/// Append one report row to `path`, creating the file (with header) if needed
pub fn append_report(path: &Path, report: &AggregateReport) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV output file {}", path.display()))?;

    let is_new = file
        .metadata()
        .with_context(|| format!("Failed to stat CSV output file {}", path.display()))?
        .len()
        == 0;
    if is_new {
        writeln!(file, "{}", CSV_HEADER)?;
    }

    writeln!(file, "{}", format_row(report))?;
    Ok(())
}

/// Format one report as a CSV row (no trailing newline)
pub fn format_row(report: &AggregateReport) -> String {
    format!(
        "{},{},{},{},{},{}",
        report.started_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        report.file_size,
        report.worker_count,
        report.pool_kind,
        phase_columns(&report.upload),
        phase_columns(&report.download),
    )
}

fn phase_columns(stats: &PhaseStats) -> String {
    format!(
        "{},{},{:.3},{:.2},{}",
        stats.successful,
        stats.failed,
        stats.max_elapsed.as_secs_f64(),
        stats.throughput_mb_s(),
        stats.total_bytes,
    )
}
