//! Worker pools
//!
//! Runs `worker_count` transfer workflows concurrently and hands back one
//! [`WorkerResult`] per worker. Two strategies share the same contract:
//!
//! - [`SharedPool`]: tokio tasks in this process, sharing one fixture
//! - [`ProcessPool`]: one child process per worker, each rebuilding the
//!   fixture from the run seed
//!
//! Results come back in completion order. A worker that panics or whose
//! process dies is reported as a `WorkerCrashed` result; it never takes the
//! pool down with it.

pub mod process;
pub mod shared;

pub use process::ProcessPool;
pub use shared::SharedPool;

use crate::workflow::{FixtureStore, WorkerResult, WorkflowSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

/// Concurrency strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Tasks in one process
    #[default]
    Shared,
    /// One process per worker
    Process,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Shared => write!(f, "shared"),
            PoolKind::Process => write!(f, "process"),
        }
    }
}

/// A strategy for running many workflows at once
pub trait WorkerPool {
    /// Strategy implemented by this pool
    fn kind(&self) -> PoolKind;

    /// Run `worker_count` workflows (ids `0..worker_count`) to completion
    ///
    /// Always yields exactly `worker_count` results, in completion order.
    fn run(
        &self,
        spec: &WorkflowSpec,
        worker_count: usize,
    ) -> impl Future<Output = Vec<WorkerResult>> + Send;
}

/// Picks a pool for each run and drives it
pub struct Orchestrator {
    template: WorkflowSpec,
    fixtures: Arc<FixtureStore>,
    worker_program: Option<PathBuf>,
    debug: bool,
}

impl Orchestrator {
    /// Create an orchestrator; `template.file_size` is replaced per run
    pub fn new(template: WorkflowSpec) -> Self {
        let fixtures = Arc::new(FixtureStore::new(template.seed));
        Self {
            template,
            fixtures,
            worker_program: None,
            debug: false,
        }
    }

    /// Binary launched by the process pool (defaults to the current executable)
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Forward debug logging to worker processes
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Run one batch of workers
    ///
    /// Only fails if the process pool cannot locate its worker binary; worker
    /// failures are always reported through the results.
    pub async fn run(
        &self,
        worker_count: usize,
        file_size: u64,
        pool_kind: PoolKind,
    ) -> anyhow::Result<Vec<WorkerResult>> {
        let spec = WorkflowSpec {
            file_size,
            ..self.template.clone()
        };

        info!(
            workers = worker_count,
            file_size,
            pool = %pool_kind,
            server = %spec.server,
            "starting workers"
        );
        let start = Instant::now();

        let results = match pool_kind {
            PoolKind::Shared => SharedPool::new(self.fixtures.clone()).run(&spec, worker_count).await,
            PoolKind::Process => {
                let pool = match &self.worker_program {
                    Some(program) => ProcessPool::new(program.clone()),
                    None => ProcessPool::current_exe()?,
                };
                pool.with_debug(self.debug).run(&spec, worker_count).await
            }
        };

        info!(
            workers = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "all workers finished"
        );
        Ok(results)
    }
}

/// Await one worker task, turning a panic or cancellation into a crash result
async fn supervise(
    worker_id: usize,
    filename: String,
    handle: JoinHandle<WorkerResult>,
) -> WorkerResult {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            warn!(worker = worker_id, "worker task failed: {}", e);
            WorkerResult::crashed(worker_id, filename, format!("worker task failed: {}", e))
        }
    }
}

/// Drain a set of supervised workers in completion order
///
/// Any worker id in `0..expected` that produced no result (its supervising
/// task was lost) is reported as crashed, so the caller always gets
/// `expected` results.
async fn collect(
    mut set: JoinSet<WorkerResult>,
    spec: &WorkflowSpec,
    expected: usize,
) -> Vec<WorkerResult> {
    let mut results = Vec::with_capacity(expected);
    let mut reported = HashSet::with_capacity(expected);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => {
                reported.insert(result.worker_id);
                results.push(result);
            }
            Err(e) => warn!("worker supervisor failed: {}", e),
        }
    }

    for worker_id in (0..expected).filter(|id| !reported.contains(id)) {
        warn!(worker = worker_id, "no result from worker");
        results.push(WorkerResult::crashed(
            worker_id,
            spec.filename(worker_id),
            "worker result lost",
        ));
    }
    results
}
