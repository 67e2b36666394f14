//! Mock file server for testing
//!
//! A small in-memory server that speaks the file server protocol over real TCP
//! on `127.0.0.1`. It lets tests drive the transport, client, workflow and
//! pools end to end without an external server process.
//!
//! # Features
//!
//! - Stores uploads in memory, lists them, echoes them back on GET
//! - Scriptable failures: rejected uploads, hidden files, corrupt payloads
//! - Chunked response writes and connection-close framing
//! - Records every request verb and counts connections
//!
//! # Example
//!
//! ```no_run
//! use filepulse::protocol::mock::MockServer;
//! use filepulse::protocol::{Command, Transport};
//!
//! # async fn demo() -> std::io::Result<()> {
//! let server = MockServer::start().await?;
//! server.insert_file("hello.txt", b"hello".to_vec());
//!
//! let transport = Transport::new(server.address());
//! let response = transport.execute(&Command::List).await.unwrap();
//! assert_eq!(response.files().unwrap(), &["hello.txt".to_string()]);
//! # Ok(())
//! # }
//! ```

use super::codec::{decode_request, find_terminator, Request};
use super::TERMINATOR;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

/// Scriptable behavior of the mock server
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Write responses in chunks of this many bytes (flushing each)
    pub chunk_size: Option<usize>,

    /// Close the connection instead of writing the terminator
    pub omit_terminator: bool,

    /// Reject uploads whose filename contains this marker
    pub reject_marker: Option<String>,

    /// Never report stored files in LIST
    pub hide_from_list: bool,

    /// Truncate the base64 payload of GET responses
    pub corrupt_downloads: bool,

    /// Flip the first byte of GET contents (encoding stays valid)
    pub tamper_downloads: bool,
}

#[derive(Debug, Default)]
struct MockState {
    files: Mutex<HashMap<String, Vec<u8>>>,
    behavior: Mutex<MockBehavior>,
    requests: Mutex<Vec<String>>,
    connections: AtomicU64,
}

/// In-memory file server listening on an ephemeral localhost port
///
/// The accept loop runs on the current tokio runtime and stops when the
/// server is dropped.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Start a mock server with default (well-behaved) settings
    pub async fn start() -> std::io::Result<Self> {
        Self::with_behavior(MockBehavior::default()).await
    }

    /// Start a mock server with the given behavior
    pub async fn with_behavior(behavior: MockBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState::default());
        *lock(&state.behavior) = behavior;

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!("mock server accept failed: {}", e);
                        continue;
                    }
                };
                accept_state.connections.fetch_add(1, Ordering::Relaxed);
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, conn_state).await {
                        debug!(%peer, "mock server connection error: {}", e);
                    }
                });
            }
        });

        Ok(Self {
            addr,
            state,
            accept_task,
        })
    }

    /// Address as a `host:port` string
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Put a file directly into the store
    pub fn insert_file(&self, name: &str, contents: Vec<u8>) {
        lock(&self.state.files).insert(name.to_string(), contents);
    }

    /// Contents of a stored file
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.state.files).get(name).cloned()
    }

    /// Sorted names of all stored files
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.state.files).keys().cloned().collect();
        names.sort();
        names
    }

    /// Verbs of all requests received so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state.requests).clone()
    }

    /// Number of accepted connections
    pub fn connection_count(&self) -> u64 {
        self.state.connections.load(Ordering::Relaxed)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(mut socket: TcpStream, state: Arc<MockState>) -> std::io::Result<()> {
    socket.set_nodelay(true)?;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut scanned = 0;
    let frame_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_terminator(&buf, scanned) {
            break pos + TERMINATOR.len();
        }
        scanned = buf.len();
    };

    let behavior = lock(&state.behavior).clone();
    let body = match decode_request(&buf[..frame_end]) {
        Ok(request) => {
            lock(&state.requests).push(request_verb(&request).to_string());
            respond(&request, &state, &behavior)
        }
        Err(e) => json!({ "status": "ERROR", "data": e.to_string() }),
    };

    let mut out = serde_json::to_vec(&body)?;
    if !behavior.omit_terminator {
        out.extend_from_slice(TERMINATOR);
    }

    match behavior.chunk_size {
        Some(size) if size > 0 => {
            for piece in out.chunks(size) {
                socket.write_all(piece).await?;
                socket.flush().await?;
                tokio::task::yield_now().await;
            }
        }
        _ => socket.write_all(&out).await?,
    }
    socket.shutdown().await
}

fn request_verb(request: &Request) -> &'static str {
    match request {
        Request::List => "LIST",
        Request::Fetch(_) => "GET",
        Request::Store(_, _) => "UPLOAD",
    }
}

fn respond(request: &Request, state: &MockState, behavior: &MockBehavior) -> serde_json::Value {
    match request {
        Request::List => {
            let names: Vec<String> = if behavior.hide_from_list {
                Vec::new()
            } else {
                let mut names: Vec<String> = lock(&state.files).keys().cloned().collect();
                names.sort();
                names
            };
            json!({ "status": "OK", "data": names })
        }
        Request::Fetch(name) => match lock(&state.files).get(name) {
            Some(contents) => {
                let mut encoded = if behavior.tamper_downloads && !contents.is_empty() {
                    let mut altered = contents.clone();
                    altered[0] ^= 0xFF;
                    BASE64_STANDARD.encode(altered)
                } else {
                    BASE64_STANDARD.encode(contents)
                };
                if behavior.corrupt_downloads {
                    encoded.pop();
                    if encoded.is_empty() {
                        encoded.push('=');
                    }
                }
                json!({ "status": "OK", "data_namafile": name, "data_file": encoded })
            }
            None => json!({ "status": "ERROR", "data": format!("File {} not found", name) }),
        },
        Request::Store(name, payload) => {
            if let Some(marker) = &behavior.reject_marker {
                if name.contains(marker.as_str()) {
                    return json!({ "status": "ERROR", "data": format!("Upload of {} rejected", name) });
                }
            }
            lock(&state.files).insert(name.clone(), payload.clone());
            json!({ "status": "OK", "data": format!("File {} uploaded successfully", name) })
        }
    }
}

/// Lock a mutex, ignoring poisoning from a panicked test thread
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Transport};

    #[tokio::test]
    async fn test_upload_then_get() {
        let server = MockServer::start().await.unwrap();
        let transport = Transport::new(server.address());

        let response = transport
            .execute(&Command::Store("a.dat", b"payload"))
            .await
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(server.file("a.dat").unwrap(), b"payload");

        let response = transport.execute(&Command::Fetch("a.dat")).await.unwrap();
        assert_eq!(response.payload().unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_reject_marker() {
        let server = MockServer::with_behavior(MockBehavior {
            reject_marker: Some("bad".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        let transport = Transport::new(server.address());

        let response = transport
            .execute(&Command::Store("bad_file.dat", b"x"))
            .await
            .unwrap();
        assert!(!response.is_ok());
        assert!(server.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_file() {
        let server = MockServer::start().await.unwrap();
        let transport = Transport::new(server.address());

        let response = transport.execute(&Command::Fetch("nope.dat")).await.unwrap();
        assert!(!response.is_ok());
        assert!(response.message().unwrap().contains("nope.dat"));
    }

    #[tokio::test]
    async fn test_corrupt_downloads() {
        let server = MockServer::with_behavior(MockBehavior {
            corrupt_downloads: true,
            ..Default::default()
        })
        .await
        .unwrap();
        server.insert_file("a.dat", b"hello".to_vec());

        let transport = Transport::new(server.address());
        let response = transport.execute(&Command::Fetch("a.dat")).await.unwrap();
        assert!(response.is_ok());
        assert!(response.payload().is_err());
    }
}
