//! Per-worker transfer workflow
//!
//! Each worker runs exactly one workflow: upload a fixture, confirm the server
//! lists it, download it back and check the content.
//!
//! # States
//!
//! ```text
//! Init → Uploading → Verifying → Downloading → Done
//!            │           │            │
//!            └───────────┴────────────┴──→ Done (on failure)
//! ```
//!
//! A failure in any phase is recorded in the [`WorkerResult`] and the
//! workflow jumps straight to `Done`. Nothing here returns an error to the
//! caller; the pool always gets a result back.

pub mod fixture;
pub mod verify;

pub use fixture::{size_label, Fixture, FixtureStore};
pub use verify::{verify, VerifyMode, VerifyResult, DEFAULT_PREFIX_LEN};

use crate::client::ProtocolClient;
use crate::protocol::{Failure, FailureKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything a worker needs to run its workflow
///
/// Plain data, so the process pool can hand it to child processes on the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Server address (host:port)
    pub server: String,

    /// Payload size in bytes
    pub file_size: u64,

    /// Deadline for each protocol call
    pub timeout: Option<Duration>,

    /// How downloads are checked
    pub verify: VerifyMode,

    /// Seed for fixture generation
    pub seed: u64,

    /// Optional prefix for upload filenames
    pub tag: Option<String>,
}

impl WorkflowSpec {
    /// Upload filename for a worker
    pub fn filename(&self, worker_id: usize) -> String {
        let base = format!("testfile_{}_{}.dat", worker_id, size_label(self.file_size));
        match &self.tag {
            Some(tag) => format!("{}_{}", tag, base),
            None => base,
        }
    }

    /// Protocol client for the configured server
    pub fn client(&self) -> ProtocolClient {
        ProtocolClient::with_timeout(self.server.clone(), self.timeout)
    }
}

/// Result of the upload phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The server answered
    Completed {
        /// Server reported OK
        success: bool,
        elapsed: Duration,
        bytes: u64,
        /// Short description of the server's response
        server_response: String,
    },
    /// No usable answer from the server
    Failed(Failure),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Completed { success: true, .. })
    }

    /// Elapsed time, for any upload the server answered
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            UploadOutcome::Completed { elapsed, .. } => Some(*elapsed),
            UploadOutcome::Failed(_) => None,
        }
    }

    /// Bytes sent, for successful uploads only
    pub fn success_bytes(&self) -> Option<u64> {
        match self {
            UploadOutcome::Completed {
                success: true,
                bytes,
                ..
            } => Some(*bytes),
            _ => None,
        }
    }
}

/// Result of the download phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Content was downloaded
    Completed {
        elapsed: Duration,
        bytes: u64,
        /// Content check passed under the configured verify mode
        content_matches_prefix: bool,
    },
    /// Download skipped or failed
    Failed(Failure),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Completed { .. })
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            DownloadOutcome::Completed { elapsed, .. } => Some(*elapsed),
            DownloadOutcome::Failed(_) => None,
        }
    }

    pub fn success_bytes(&self) -> Option<u64> {
        match self {
            DownloadOutcome::Completed { bytes, .. } => Some(*bytes),
            DownloadOutcome::Failed(_) => None,
        }
    }

    pub fn content_valid(&self) -> bool {
        matches!(
            self,
            DownloadOutcome::Completed {
                content_matches_prefix: true,
                ..
            }
        )
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            DownloadOutcome::Failed(failure) => Some(failure),
            DownloadOutcome::Completed { .. } => None,
        }
    }
}

/// Everything one worker observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: usize,
    pub filename: String,
    pub upload: Option<UploadOutcome>,
    pub download: Option<DownloadOutcome>,
    /// Fault outside the normal phase failures (crash, lost worker process)
    pub error: Option<Failure>,
}

impl WorkerResult {
    pub fn new(worker_id: usize, filename: impl Into<String>) -> Self {
        Self {
            worker_id,
            filename: filename.into(),
            upload: None,
            download: None,
            error: None,
        }
    }

    /// Result for a worker that died before reporting
    pub fn crashed(worker_id: usize, filename: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(worker_id, filename);
        result.error = Some(Failure::new(FailureKind::WorkerCrashed, message));
        result
    }

    pub fn upload_succeeded(&self) -> bool {
        self.upload.as_ref().is_some_and(UploadOutcome::is_success)
    }

    pub fn download_succeeded(&self) -> bool {
        self.download.as_ref().is_some_and(DownloadOutcome::is_success)
    }
}

/// Workflow progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Uploading,
    Verifying,
    Downloading,
    Done,
}

/// One worker's upload/verify/download cycle
pub struct TransferWorkflow {
    worker_id: usize,
    filename: String,
    client: ProtocolClient,
    fixture: Arc<Fixture>,
    verify_mode: VerifyMode,
    state: WorkflowState,
}

impl TransferWorkflow {
    /// Prepare a workflow using an already generated fixture
    pub fn new(worker_id: usize, spec: &WorkflowSpec, fixture: Arc<Fixture>) -> Self {
        Self {
            worker_id,
            filename: spec.filename(worker_id),
            client: spec.client(),
            fixture,
            verify_mode: spec.verify,
            state: WorkflowState::Init,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(worker = self.worker_id, from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
    }

    /// Run all phases and return the worker's result
    pub async fn run(mut self) -> WorkerResult {
        let mut result = WorkerResult::new(self.worker_id, self.filename.clone());

        self.transition(WorkflowState::Uploading);
        let upload = self.upload().await;
        let uploaded = upload.is_success();
        result.upload = Some(upload);
        if !uploaded {
            warn!(worker = self.worker_id, file = %self.filename, "upload failed, skipping download");
            result.download = Some(DownloadOutcome::Failed(Failure::new(
                FailureKind::UploadSkipped,
                "upload failed, skipping download",
            )));
            self.transition(WorkflowState::Done);
            return result;
        }

        self.transition(WorkflowState::Verifying);
        if let Err(failure) = self.check_listed().await {
            warn!(worker = self.worker_id, file = %self.filename, "verification failed: {}", failure);
            result.download = Some(DownloadOutcome::Failed(failure));
            self.transition(WorkflowState::Done);
            return result;
        }

        self.transition(WorkflowState::Downloading);
        let download = self.download().await;
        if let DownloadOutcome::Failed(failure) = &download {
            warn!(worker = self.worker_id, file = %self.filename, "download failed: {}", failure);
        }
        result.download = Some(download);

        self.transition(WorkflowState::Done);
        result
    }

    async fn upload(&self) -> UploadOutcome {
        let payload = self.fixture.bytes();
        let start = Instant::now();
        match self.client.store(&self.filename, payload).await {
            Ok(response) => {
                let elapsed = start.elapsed();
                debug!(
                    worker = self.worker_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "upload answered: {}",
                    response.describe()
                );
                UploadOutcome::Completed {
                    success: response.is_ok(),
                    elapsed,
                    bytes: payload.len() as u64,
                    server_response: response.describe(),
                }
            }
            Err(e) => UploadOutcome::Failed(Failure::from(e)),
        }
    }

    async fn check_listed(&self) -> Result<(), Failure> {
        let names = self.client.list().await.map_err(Failure::from)?;
        if names.iter().any(|name| name == &self.filename) {
            Ok(())
        } else {
            Err(Failure::new(
                FailureKind::NotFoundAfterUpload,
                format!("{} not found on server after upload", self.filename),
            ))
        }
    }

    async fn download(&self) -> DownloadOutcome {
        let start = Instant::now();
        let fetched = self.client.fetch(&self.filename).await;
        let elapsed = start.elapsed();

        match fetched {
            Some(contents) => {
                let check = verify(&contents, self.fixture.bytes(), self.verify_mode);
                if let VerifyResult::Mismatch { offset, .. } = &check {
                    warn!(worker = self.worker_id, offset, "downloaded content differs from source");
                }
                DownloadOutcome::Completed {
                    elapsed,
                    bytes: contents.len() as u64,
                    content_matches_prefix: check.is_match(),
                }
            }
            None => DownloadOutcome::Failed(Failure::new(
                FailureKind::EmptyDownload,
                format!("server returned no content for {}", self.filename),
            )),
        }
    }
}
