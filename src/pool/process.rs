//! Isolated-process pool: every worker is a child process
//!
//! Each child is this binary in worker mode. It rebuilds the fixture from the
//! seed and size it is given, runs one workflow and prints its
//! [`WorkerResult`] as a single JSON line on stdout. Logs go to stderr, which
//! is passed through.

use super::{collect, PoolKind, WorkerPool};
use crate::workflow::{VerifyMode, WorkerResult, WorkflowSpec};
use anyhow::Context;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Runs workers as child processes of `program`
pub struct ProcessPool {
    program: PathBuf,
    debug: bool,
}

impl ProcessPool {
    /// Pool launching the given worker binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            debug: false,
        }
    }

    /// Pool launching the currently running executable
    pub fn current_exe() -> anyhow::Result<Self> {
        let program = std::env::current_exe()
            .context("Failed to get current executable path")?;
        Ok(Self::new(program))
    }

    /// Pass `--debug` to worker processes
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build the command line for one worker
    fn worker_command(&self, spec: &WorkflowSpec, worker_id: usize) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--mode").arg("worker");
        cmd.arg("--server").arg(&spec.server);
        cmd.arg("--file-size").arg(spec.file_size.to_string());
        cmd.arg("--worker-id").arg(worker_id.to_string());
        cmd.arg("--seed").arg(spec.seed.to_string());

        // "0" disables the deadline in the child
        let timeout = spec
            .timeout
            .map_or(0, |timeout| timeout.as_millis().max(1));
        cmd.arg("--timeout").arg(format!("{}ms", timeout));
        match spec.verify {
            VerifyMode::Prefix(len) => {
                cmd.arg("--verify-prefix").arg(len.to_string());
            }
            VerifyMode::Full => {
                cmd.arg("--full-verify");
            }
        }
        if let Some(tag) = &spec.tag {
            cmd.arg("--tag").arg(tag);
        }
        if self.debug {
            cmd.arg("--debug");
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl WorkerPool for ProcessPool {
    fn kind(&self) -> PoolKind {
        PoolKind::Process
    }

    async fn run(&self, spec: &WorkflowSpec, worker_count: usize) -> Vec<WorkerResult> {
        let mut set = JoinSet::new();

        // Start every child before waiting on any of them
        for worker_id in 0..worker_count {
            let filename = spec.filename(worker_id);
            match self.worker_command(spec, worker_id).spawn() {
                Ok(child) => {
                    debug!(worker = worker_id, pid = child.id(), "worker process started");
                    set.spawn(async move {
                        match child.wait_with_output().await {
                            Ok(output) => parse_worker_output(worker_id, filename, &output),
                            Err(e) => WorkerResult::crashed(
                                worker_id,
                                filename,
                                format!("failed to wait for worker process: {}", e),
                            ),
                        }
                    });
                }
                Err(e) => {
                    warn!(worker = worker_id, program = %self.program.display(), "failed to spawn worker: {}", e);
                    let message = format!("failed to spawn worker process: {}", e);
                    set.spawn(async move { WorkerResult::crashed(worker_id, filename, message) });
                }
            }
        }

        collect(set, spec, worker_count).await
    }
}

/// Turn a finished child's output into its result
fn parse_worker_output(worker_id: usize, filename: String, output: &Output) -> WorkerResult {
    if !output.status.success() {
        warn!(worker = worker_id, status = %output.status, "worker process failed");
        return WorkerResult::crashed(
            worker_id,
            filename,
            format!("worker process exited with {}", output.status),
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty());
    let parsed = line.map(serde_json::from_str::<WorkerResult>);

    match parsed {
        Some(Ok(result)) if result.worker_id == worker_id => result,
        Some(Ok(result)) => WorkerResult::crashed(
            worker_id,
            filename,
            format!("worker process reported id {}", result.worker_id),
        ),
        Some(Err(e)) => WorkerResult::crashed(
            worker_id,
            filename,
            format!("unparseable worker output: {}", e),
        ),
        None => WorkerResult::crashed(worker_id, filename, "worker process produced no output"),
    }
}
