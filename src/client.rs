//! Protocol client
//!
//! Typed operations over the wire protocol. The client holds nothing but the
//! transport settings; every call opens and closes its own connection, so a
//! client can be cloned into as many workers as needed.

use crate::protocol::{validate_filename, Command, ProtocolError, Response, Transport};
use std::time::Duration;
use tracing::debug;

/// Client for one file server
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    transport: Transport,
}

impl ProtocolClient {
    /// Create a client for the given `host:port` endpoint
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            transport: Transport::new(addr),
        }
    }

    /// Create a client with a per-call deadline
    pub fn with_timeout(addr: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            transport: Transport::new(addr).with_timeout(timeout),
        }
    }

    /// List all filenames stored on the server
    pub async fn list(&self) -> Result<Vec<String>, ProtocolError> {
        let response = self.transport.execute(&Command::List).await?;
        if !response.is_ok() {
            return Err(ProtocolError::ServerError(server_message(&response)));
        }
        match response.files() {
            Some(names) => Ok(names.to_vec()),
            None => Err(ProtocolError::MalformedResponse(format!(
                "LIST returned no file list ({})",
                response.describe()
            ))),
        }
    }

    /// Fetch a file, reporting why it could not be fetched
    pub async fn try_fetch(&self, name: &str) -> Result<Vec<u8>, ProtocolError> {
        validate_filename(name)?;
        let response = self.transport.execute(&Command::Fetch(name)).await?;
        if !response.is_ok() {
            return Err(ProtocolError::ServerError(server_message(&response)));
        }
        response.payload()
    }

    /// Fetch a file
    ///
    /// Returns `None` when the server reports an error, the exchange fails or
    /// the payload cannot be decoded. Use [`try_fetch`](Self::try_fetch) to get
    /// the reason.
    pub async fn fetch(&self, name: &str) -> Option<Vec<u8>> {
        match self.try_fetch(name).await {
            Ok(contents) => Some(contents),
            Err(e) => {
                debug!(file = name, "fetch failed: {}", e);
                None
            }
        }
    }

    /// Store a file in a single UPLOAD command
    ///
    /// The raw response is returned; callers decide what its status means.
    pub async fn store(&self, name: &str, contents: &[u8]) -> Result<Response, ProtocolError> {
        validate_filename(name)?;
        self.transport.execute(&Command::Store(name, contents)).await
    }
}

fn server_message(response: &Response) -> String {
    response
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| response.describe())
}
