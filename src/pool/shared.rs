//! Shared-memory pool: every worker is a tokio task in this process

use super::{collect, supervise, PoolKind, WorkerPool};
use crate::workflow::{FixtureStore, TransferWorkflow, WorkerResult, WorkflowSpec};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Runs workers as tasks on the current runtime
///
/// The fixture is generated (or taken from the cache) before the first
/// worker starts; all workers read the same bytes through an `Arc`.
pub struct SharedPool {
    fixtures: Arc<FixtureStore>,
}

impl SharedPool {
    pub fn new(fixtures: Arc<FixtureStore>) -> Self {
        Self { fixtures }
    }
}

impl WorkerPool for SharedPool {
    fn kind(&self) -> PoolKind {
        PoolKind::Shared
    }

    async fn run(&self, spec: &WorkflowSpec, worker_count: usize) -> Vec<WorkerResult> {
        let store = self.fixtures.clone();
        let size = spec.file_size;
        // Generating large payloads is CPU-bound; keep it off the async workers
        let fixture = match tokio::task::spawn_blocking(move || store.get(size)).await {
            Ok(fixture) => fixture,
            Err(e) => {
                warn!("fixture generation failed: {}", e);
                return (0..worker_count)
                    .map(|id| {
                        WorkerResult::crashed(
                            id,
                            spec.filename(id),
                            format!("fixture generation failed: {}", e),
                        )
                    })
                    .collect();
            }
        };
        debug!(size = fixture.len(), workers = worker_count, "fixture ready");

        let mut set = JoinSet::new();
        for worker_id in 0..worker_count {
            let workflow = TransferWorkflow::new(worker_id, spec, fixture.clone());
            let filename = workflow.filename().to_string();
            let handle = tokio::spawn(workflow.run());
            set.spawn(supervise(worker_id, filename, handle));
        }

        collect(set, spec, worker_count).await
    }
}
