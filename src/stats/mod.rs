//! Run statistics
//!
//! Reduces the set of [`WorkerResult`]s from one run into an
//! [`AggregateReport`]. The reduction is pure: the same results and run
//! parameters always give the same report.
//!
//! # Throughput
//!
//! Throughput is measured against the slowest worker, not the average:
//!
//! ```text
//! throughput = sum(bytes of successful transfers) / max(elapsed)
//! ```
//!
//! Since all workers start together, `max(elapsed)` approximates the wall
//! time the whole batch needed, so the figure is the rate the server actually
//! sustained. Upload times count every upload the server answered (even
//! rejected ones); download times count successful downloads only.

pub mod aggregator;
pub mod histogram;

pub use aggregator::StatisticsAggregator;
pub use histogram::{LatencyHistogram, LatencySummary};

use crate::pool::PoolKind;
use crate::util::time::{calculate_throughput, to_mb};
use crate::workflow::WorkerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics for one phase (upload or download)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    /// Workers whose phase succeeded
    pub successful: usize,

    /// `worker_count - successful`
    pub failed: usize,

    /// Slowest counted transfer (zero if none)
    pub max_elapsed: Duration,

    /// `total_bytes / max_elapsed`, zero if `max_elapsed` is zero
    pub throughput_bytes_per_sec: f64,

    /// Bytes moved by successful transfers
    pub total_bytes: u64,

    /// Distribution of the counted transfer times
    pub latency: Option<LatencySummary>,
}

impl PhaseStats {
    /// Build phase statistics from raw counts and timing samples
    pub fn from_samples(
        worker_count: usize,
        successful: usize,
        total_bytes: u64,
        elapsed: impl IntoIterator<Item = Duration>,
    ) -> Self {
        let mut histogram = LatencyHistogram::new();
        let mut max_elapsed = Duration::ZERO;
        for sample in elapsed {
            max_elapsed = max_elapsed.max(sample);
            histogram.record(sample);
        }

        Self {
            successful,
            failed: worker_count.saturating_sub(successful),
            max_elapsed,
            throughput_bytes_per_sec: calculate_throughput(total_bytes, max_elapsed),
            total_bytes,
            latency: histogram.summary(),
        }
    }

    pub fn throughput_mb_s(&self) -> f64 {
        to_mb(self.throughput_bytes_per_sec)
    }

    pub fn total_mb(&self) -> f64 {
        to_mb(self.total_bytes as f64)
    }
}

/// Parameters of a run that the report needs besides worker results
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub file_size: u64,
    pub worker_count: usize,
    pub pool_kind: PoolKind,
    pub started_at: DateTime<Utc>,
    pub wall_time: Duration,
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub file_size: u64,
    pub worker_count: usize,
    pub pool_kind: PoolKind,
    pub upload: PhaseStats,
    pub download: PhaseStats,
    pub started_at: DateTime<Utc>,
    /// Time from the first worker starting to the last one finishing
    pub wall_time: Duration,
}

/// Reduce worker results into a report
///
/// `params.worker_count` is the configured count; workers missing from
/// `results` count as failed in both phases.
pub fn aggregate<'a>(
    results: impl IntoIterator<Item = &'a WorkerResult>,
    params: &RunParameters,
) -> AggregateReport {
    let results: Vec<&WorkerResult> = results.into_iter().collect();

    let uploads = results.iter().filter_map(|r| r.upload.as_ref());
    let upload_ok = uploads.clone().filter(|u| u.is_success()).count();
    let upload_bytes: u64 = uploads.clone().filter_map(|u| u.success_bytes()).sum();
    let upload = PhaseStats::from_samples(
        params.worker_count,
        upload_ok,
        upload_bytes,
        uploads.filter_map(|u| u.elapsed()),
    );

    let downloads = results.iter().filter_map(|r| r.download.as_ref());
    let download_ok = downloads.clone().filter(|d| d.is_success()).count();
    let download_bytes: u64 = downloads.clone().filter_map(|d| d.success_bytes()).sum();
    let download = PhaseStats::from_samples(
        params.worker_count,
        download_ok,
        download_bytes,
        downloads.filter_map(|d| d.elapsed()),
    );

    AggregateReport {
        file_size: params.file_size,
        worker_count: params.worker_count,
        pool_kind: params.pool_kind,
        upload,
        download,
        started_at: params.started_at,
        wall_time: params.wall_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Failure, FailureKind};
    use crate::workflow::{DownloadOutcome, UploadOutcome};

    const MB: u64 = 1024 * 1024;

    fn params(worker_count: usize) -> RunParameters {
        RunParameters {
            file_size: 10 * MB,
            worker_count,
            pool_kind: PoolKind::Shared,
            started_at: Utc::now(),
            wall_time: Duration::from_secs(3),
        }
    }

    fn result(id: usize, upload: Option<UploadOutcome>, download: Option<DownloadOutcome>) -> WorkerResult {
        WorkerResult {
            upload,
            download,
            ..WorkerResult::new(id, format!("testfile_{}_10mb.dat", id))
        }
    }

    fn uploaded(success: bool, millis: u64) -> Option<UploadOutcome> {
        Some(UploadOutcome::Completed {
            success,
            elapsed: Duration::from_millis(millis),
            bytes: 10 * MB,
            server_response: "OK".to_string(),
        })
    }

    fn downloaded(millis: u64) -> Option<DownloadOutcome> {
        Some(DownloadOutcome::Completed {
            elapsed: Duration::from_millis(millis),
            bytes: 10 * MB,
            content_matches_prefix: true,
        })
    }

    #[test]
    fn test_bottleneck_throughput() {
        let results = vec![
            result(0, uploaded(true, 1000), downloaded(500)),
            result(1, uploaded(true, 2000), downloaded(800)),
            result(2, uploaded(true, 1500), downloaded(1000)),
        ];

        let report = aggregate(&results, &params(3));

        assert_eq!(report.upload.successful, 3);
        assert_eq!(report.upload.failed, 0);
        assert_eq!(report.upload.total_bytes, 30 * MB);
        assert_eq!(report.upload.max_elapsed, Duration::from_secs(2));
        assert_eq!(report.upload.throughput_mb_s(), 15.0);
        assert_eq!(report.download.throughput_mb_s(), 30.0);
        assert_eq!(report.upload.latency.unwrap().count, 3);
    }

    #[test]
    fn test_rejected_upload_counts_in_max_only() {
        let results = vec![
            result(0, uploaded(true, 1000), downloaded(500)),
            result(
                1,
                uploaded(false, 4000),
                Some(DownloadOutcome::Failed(Failure::new(FailureKind::UploadSkipped, "skip"))),
            ),
        ];

        let report = aggregate(&results, &params(2));

        assert_eq!(report.upload.successful, 1);
        assert_eq!(report.upload.failed, 1);
        assert_eq!(report.upload.total_bytes, 10 * MB);
        assert_eq!(report.upload.max_elapsed, Duration::from_secs(4));
        assert_eq!(report.download.successful, 1);
        assert_eq!(report.download.max_elapsed, Duration::from_millis(500));
    }

    #[test]
    fn test_no_successes() {
        let results = vec![result(
            0,
            Some(UploadOutcome::Failed(Failure::new(FailureKind::Unreachable, "refused"))),
            None,
        )];

        let report = aggregate(&results, &params(1));

        assert_eq!(report.upload.successful, 0);
        assert_eq!(report.upload.failed, 1);
        assert_eq!(report.upload.max_elapsed, Duration::ZERO);
        assert_eq!(report.upload.throughput_bytes_per_sec, 0.0);
        assert!(report.upload.latency.is_none());
        assert_eq!(report.download.failed, 1);
    }

    #[test]
    fn test_missing_workers_count_as_failed() {
        let results = vec![result(0, uploaded(true, 100), downloaded(100))];
        let report = aggregate(&results, &params(4));
        assert_eq!(report.upload.failed, 3);
        assert_eq!(report.download.failed, 3);
    }

    #[test]
    fn test_crashed_worker() {
        let results = vec![
            result(0, uploaded(true, 100), downloaded(100)),
            WorkerResult::crashed(1, "testfile_1_10mb.dat", "killed"),
        ];
        let report = aggregate(&results, &params(2));
        assert_eq!(report.upload.successful, 1);
        assert_eq!(report.download.failed, 1);
    }

    #[test]
    fn test_report_serializes() {
        let results = vec![result(0, uploaded(true, 100), downloaded(100))];
        let report = aggregate(&results, &params(1));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"pool_kind\":\"shared\""));
        let back: AggregateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.upload.successful, 1);
    }
}
