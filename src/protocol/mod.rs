//! File server wire protocol
//!
//! This module defines the request/response protocol spoken by the file server
//! under test. The protocol is text based and synchronous: one command per TCP
//! connection, one response frame back.
//!
//! # Frame Format
//!
//! ```text
//! Client                                   Server
//!    |                                        |
//!    |-- LIST\r\n\r\n ----------------------->|
//!    |<- {"status":"OK","data":[..]}\r\n\r\n -|
//!    |                                        |
//!    |-- GET <name>\r\n\r\n ----------------->|
//!    |<- {"status":"OK","data_file":..}\r\n\r\n
//!    |                                        |
//!    |-- UPLOAD <name>\r\n<base64>\r\n\r\n -->|
//!    |<- {"status":"OK","data":".."}\r\n\r\n -|
//! ```
//!
//! There is no length prefix. Both directions end with the `\r\n\r\n`
//! terminator, and a response may also end by the server closing the
//! connection. Binary payloads travel as standard (padded) base64.
//!
//! # Modules
//!
//! - `codec`: command encoding and response decoding (no IO)
//! - `transport`: one-connection-per-command TCP exchange
//! - `mock`: scriptable stub server used by tests

pub mod codec;
pub mod mock;
pub mod transport;

pub use codec::{decode, encode, validate_filename};
pub use transport::Transport;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Frame terminator for requests and responses
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

/// A request sent to the file server
///
/// Borrows its filename and payload so that large fixture payloads are never
/// copied before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// List all files stored on the server
    List,
    /// Fetch a single file by name
    Fetch(&'a str),
    /// Store a file, payload carried inline
    Store(&'a str, &'a [u8]),
}

impl Command<'_> {
    /// Protocol verb for this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::List => "LIST",
            Command::Fetch(_) => "GET",
            Command::Store(_, _) => "UPLOAD",
        }
    }
}

/// Response status field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Error => write!(f, "ERROR"),
        }
    }
}

/// Payload of a response, depending on the verb that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseData {
    /// Filenames returned by LIST
    Files { names: Vec<String> },
    /// Human-readable message (UPLOAD acknowledgements, error descriptions)
    Message { text: String },
    /// Base64-encoded file returned by GET
    File {
        name: Option<String>,
        encoded: String,
    },
    /// Response carried no recognisable data field
    Empty,
}

/// A complete, decoded server response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub data: ResponseData,
}

impl Response {
    /// Whether the server reported success
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Filenames carried by a LIST response
    pub fn files(&self) -> Option<&[String]> {
        match &self.data {
            ResponseData::Files { names } => Some(names),
            _ => None,
        }
    }

    /// Message text, if the response carried one
    pub fn message(&self) -> Option<&str> {
        match &self.data {
            ResponseData::Message { text } => Some(text),
            _ => None,
        }
    }

    /// Decode the file payload carried by a GET response
    ///
    /// Fails with `MalformedResponse` if the response has no file payload and
    /// with `CorruptPayload` if the payload is not valid padded base64 (which
    /// includes payloads truncated in transit).
    pub fn payload(&self) -> Result<Vec<u8>, ProtocolError> {
        match &self.data {
            ResponseData::File { encoded, .. } => BASE64_STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| ProtocolError::CorruptPayload(e.to_string())),
            _ => Err(ProtocolError::MalformedResponse(
                "response carries no file payload".to_string(),
            )),
        }
    }

    /// Short description used in logs and error messages
    pub fn describe(&self) -> String {
        match &self.data {
            ResponseData::Message { text } => format!("{}: {}", self.status, text),
            ResponseData::Files { names } => format!("{}: {} files", self.status, names.len()),
            ResponseData::File { encoded, .. } => {
                format!("{}: {} encoded bytes", self.status, encoded.len())
            }
            ResponseData::Empty => self.status.to_string(),
        }
    }
}

/// Protocol-level failures
///
/// Every failure a single command can produce. None of these abort a worker;
/// the workflow converts them into a [`Failure`] on the affected phase.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("server unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("frame is missing its terminator")]
    UnexpectedEof,

    #[error("connection closed before a complete response: {0}")]
    ConnectionTerminatedEarly(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid filename {0:?}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Failure category, transferable across threads and processes
    pub fn kind(&self) -> FailureKind {
        match self {
            ProtocolError::Unreachable { .. } => FailureKind::Unreachable,
            ProtocolError::Timeout(_) => FailureKind::Timeout,
            ProtocolError::MalformedResponse(_) => FailureKind::MalformedResponse,
            ProtocolError::CorruptPayload(_) => FailureKind::CorruptPayload,
            ProtocolError::UnexpectedEof => FailureKind::UnexpectedEof,
            ProtocolError::ConnectionTerminatedEarly(_) => FailureKind::ConnectionTerminatedEarly,
            ProtocolError::ServerError(_) => FailureKind::ServerError,
            ProtocolError::InvalidFilename(_) => FailureKind::InvalidFilename,
            ProtocolError::Io(_) => FailureKind::Io,
        }
    }
}

/// Category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unreachable,
    Timeout,
    MalformedResponse,
    CorruptPayload,
    UnexpectedEof,
    ConnectionTerminatedEarly,
    ServerError,
    InvalidFilename,
    Io,
    /// Download not attempted because the upload failed
    UploadSkipped,
    /// Uploaded file missing from the server listing
    NotFoundAfterUpload,
    /// GET produced no content
    EmptyDownload,
    /// Worker task panicked or worker process died
    WorkerCrashed,
}

/// A failure recorded in a worker result
///
/// Plain data, so it serializes across the process boundary of the
/// isolated-process pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ProtocolError> for Failure {
    fn from(err: &ProtocolError) -> Self {
        Failure::new(err.kind(), err.to_string())
    }
}

impl From<ProtocolError> for Failure {
    fn from(err: ProtocolError) -> Self {
        Failure::from(&err)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
