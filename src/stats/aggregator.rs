//! Statistics aggregation
//!
//! Collects worker results as they arrive (in any order) and produces both
//! the aggregate report and a per-worker view sorted by id.
//!
//! # Example
//!
//! ```
//! use filepulse::stats::{aggregator::StatisticsAggregator, RunParameters};
//! use filepulse::pool::PoolKind;
//! use filepulse::workflow::WorkerResult;
//! use std::time::Duration;
//!
//! let mut aggregator = StatisticsAggregator::new();
//! aggregator.add_worker(WorkerResult::new(1, "testfile_1_1kb.dat"));
//! aggregator.add_worker(WorkerResult::new(0, "testfile_0_1kb.dat"));
//! assert_eq!(aggregator.worker_ids(), vec![0, 1]);
//!
//! let report = aggregator.report(&RunParameters {
//!     file_size: 1024,
//!     worker_count: 2,
//!     pool_kind: PoolKind::Shared,
//!     started_at: chrono::Utc::now(),
//!     wall_time: Duration::from_secs(1),
//! });
//! assert_eq!(report.upload.failed, 2);
//! ```

use super::{aggregate, AggregateReport, RunParameters};
use crate::workflow::WorkerResult;
use std::collections::HashMap;

/// Result collector for one run
///
/// Keyed by worker id; adding a second result for the same id replaces the
/// first.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    /// worker_id → result
    workers: HashMap<usize, WorkerResult>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    /// Add one worker's result
    pub fn add_worker(&mut self, result: WorkerResult) {
        self.workers.insert(result.worker_id, result);
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_result(&self, worker_id: usize) -> Option<&WorkerResult> {
        self.workers.get(&worker_id)
    }

    /// Worker ids in ascending order
    pub fn worker_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.workers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Results in ascending worker id order
    pub fn sorted_results(&self) -> Vec<&WorkerResult> {
        self.worker_ids()
            .into_iter()
            .filter_map(|id| self.workers.get(&id))
            .collect()
    }

    /// Ids in `0..expected` with no result
    pub fn missing_workers(&self, expected: usize) -> Vec<usize> {
        (0..expected)
            .filter(|id| !self.workers.contains_key(id))
            .collect()
    }

    /// Aggregate report over all collected results
    pub fn report(&self, params: &RunParameters) -> AggregateReport {
        aggregate(self.workers.values(), params)
    }
}

impl FromIterator<WorkerResult> for StatisticsAggregator {
    fn from_iter<I: IntoIterator<Item = WorkerResult>>(iter: I) -> Self {
        let mut aggregator = Self::new();
        for result in iter {
            aggregator.add_worker(result);
        }
        aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolKind;
    use crate::workflow::UploadOutcome;
    use chrono::Utc;
    use std::time::Duration;

    fn params(worker_count: usize) -> RunParameters {
        RunParameters {
            file_size: 1024,
            worker_count,
            pool_kind: PoolKind::Process,
            started_at: Utc::now(),
            wall_time: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_out_of_order_results() {
        let aggregator: StatisticsAggregator = [3, 0, 2, 1]
            .into_iter()
            .map(|id| WorkerResult::new(id, format!("f{}", id)))
            .collect();

        assert_eq!(aggregator.num_workers(), 4);
        assert_eq!(aggregator.worker_ids(), vec![0, 1, 2, 3]);
        let names: Vec<&str> = aggregator
            .sorted_results()
            .iter()
            .map(|r| r.filename.as_str())
            .collect();
        assert_eq!(names, vec!["f0", "f1", "f2", "f3"]);
    }

    #[test]
    fn test_missing_workers() {
        let aggregator: StatisticsAggregator = [0, 2]
            .into_iter()
            .map(|id| WorkerResult::new(id, "f"))
            .collect();
        assert_eq!(aggregator.missing_workers(4), vec![1, 3]);
    }

    #[test]
    fn test_report() {
        let mut aggregator = StatisticsAggregator::new();
        let mut ok = WorkerResult::new(0, "a");
        ok.upload = Some(UploadOutcome::Completed {
            success: true,
            elapsed: Duration::from_millis(250),
            bytes: 1024,
            server_response: "OK".to_string(),
        });
        aggregator.add_worker(ok);
        aggregator.add_worker(WorkerResult::crashed(1, "b", "gone"));

        let report = aggregator.report(&params(2));
        assert_eq!(report.pool_kind, PoolKind::Process);
        assert_eq!(report.upload.successful, 1);
        assert_eq!(report.upload.failed, 1);
        assert_eq!(report.upload.total_bytes, 1024);
        assert!(aggregator.worker_result(1).unwrap().error.is_some());
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let mut aggregator = StatisticsAggregator::new();
        aggregator.add_worker(WorkerResult::new(0, "first"));
        aggregator.add_worker(WorkerResult::new(0, "second"));
        assert_eq!(aggregator.num_workers(), 1);
        assert_eq!(aggregator.worker_result(0).unwrap().filename, "second");
    }
}
