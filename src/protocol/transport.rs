//! TCP transport
//!
//! One connection per command: connect, write the whole request frame, read
//! until the response terminator shows up or the server closes, decode, drop
//! the connection. No pooling, keep-alive or pipelining.

use super::codec::{decode, decode_unterminated, encode, find_terminator};
use super::{Command, ProtocolError, Response, TERMINATOR};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Size of each socket read
const READ_CHUNK: usize = 8192;

/// Connection settings for one file server endpoint
///
/// Holds no connection state, so a single transport can be shared freely or
/// cloned per worker.
#[derive(Debug, Clone)]
pub struct Transport {
    /// Server address (host:port)
    addr: String,

    /// Deadline for a whole exchange (connect + write + read)
    timeout: Option<Duration>,
}

impl Transport {
    /// Create a transport for the given `host:port` endpoint
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: None,
        }
    }

    /// Set the deadline applied to each call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one command and wait for its response
    ///
    /// On timeout the connection is dropped and `Timeout` is returned; there
    /// are no retries at this layer.
    pub async fn execute(&self, cmd: &Command<'_>) -> Result<Response, ProtocolError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(cmd))
                .await
                .map_err(|_| ProtocolError::Timeout(limit))?,
            None => self.exchange(cmd).await,
        }
    }

    async fn exchange(&self, cmd: &Command<'_>) -> Result<Response, ProtocolError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ProtocolError::Unreachable {
                addr: self.addr.clone(),
                source,
            })?;

        let frame = encode(cmd);
        debug!(addr = %self.addr, verb = cmd.verb(), bytes = frame.len(), "sending request");
        stream.write_all(&frame).await?;
        stream.flush().await?;
        drop(frame);

        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut scanned = 0;

        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(n) => n,
                // A reset after a whole body but before the terminator still
                // carries a usable response
                Err(e) if !buf.is_empty() => {
                    debug!(verb = cmd.verb(), bytes = buf.len(), "read failed after partial response: {}", e);
                    return decode_unterminated(&buf).map_err(|_| ProtocolError::Io(e));
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            trace!(received = buf.len(), "read chunk");

            if let Some(pos) = find_terminator(&buf, scanned) {
                let end = pos + TERMINATOR.len();
                debug!(verb = cmd.verb(), bytes = end, "response frame complete");
                return decode(&buf[..end]);
            }
            scanned = buf.len();
        }

        // Peer closed without a terminator: the last frame may still be whole
        debug!(verb = cmd.verb(), bytes = buf.len(), "connection closed before terminator");
        if buf.is_empty() {
            return Err(ProtocolError::ConnectionTerminatedEarly(
                "no response data".to_string(),
            ));
        }
        decode_unterminated(&buf)
            .map_err(|e| ProtocolError::ConnectionTerminatedEarly(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::{MockBehavior, MockServer};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_list_against_mock() {
        let server = MockServer::start().await.unwrap();
        server.insert_file("a.dat", b"abc".to_vec());

        let transport = Transport::new(server.address());
        let response = transport.execute(&Command::List).await.unwrap();
        assert!(response.is_ok());
        assert_eq!(response.files().unwrap(), &["a.dat".to_string()]);
    }

    #[tokio::test]
    async fn test_one_byte_chunks() {
        let server = MockServer::with_behavior(MockBehavior {
            chunk_size: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
        server.insert_file("chunky.dat", (0..200u8).collect());

        let transport = Transport::new(server.address());
        let response = transport.execute(&Command::Fetch("chunky.dat")).await.unwrap();
        assert_eq!(response.payload().unwrap(), (0..200u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_response_without_terminator() {
        let server = MockServer::with_behavior(MockBehavior {
            omit_terminator: true,
            ..Default::default()
        })
        .await
        .unwrap();
        server.insert_file("a.dat", b"abc".to_vec());

        let transport = Transport::new(server.address());
        let response = transport.execute(&Command::List).await.unwrap();
        assert_eq!(response.files().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_truncated_response_before_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let _ = socket.read(&mut request).await;
            socket.write_all(b"{\"status\": \"OK\", \"da").await.unwrap();
        });

        let transport = Transport::new(addr.to_string());
        let err = transport.execute(&Command::List).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionTerminatedEarly(_)));
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn test_reset_after_unterminated_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"{\"status\": \"OK\", \"data\": [\"a.dat\"]}")
                .await
                .unwrap();
            // Zero linger turns the close into a reset
            socket.set_linger(Some(Duration::ZERO)).unwrap();
        });

        let transport = Transport::new(addr.to_string());
        let response = transport.execute(&Command::List).await.unwrap();
        assert_eq!(response.files().unwrap(), &["a.dat".to_string()]);
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn test_reset_after_partial_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let _ = socket.read(&mut request).await;
            socket.write_all(b"{\"status\": \"OK\", \"da").await.unwrap();
            socket.set_linger(Some(Duration::ZERO)).unwrap();
        });

        let transport = Transport::new(addr.to_string());
        let err = transport.execute(&Command::List).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Io(_) | ProtocolError::ConnectionTerminatedEarly(_)
        ));
    }

    #[tokio::test]
    async fn test_close_without_data() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 64];
            let _ = socket.read(&mut request).await;
        });

        let transport = Transport::new(addr.to_string());
        let err = transport.execute(&Command::List).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionTerminatedEarly(_)));
    }

    #[tokio::test]
    async fn test_unreachable() {
        // Grab a free port, then release it so nothing is listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = Transport::new(addr.to_string());
        let err = transport.execute(&Command::List).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = Transport::new(addr.to_string())
            .with_timeout(Some(Duration::from_millis(100)));
        let err = transport.execute(&Command::List).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_per_call() {
        let server = MockServer::start().await.unwrap();
        let transport = Transport::new(server.address());

        transport.execute(&Command::List).await.unwrap();
        transport.execute(&Command::List).await.unwrap();
        transport.execute(&Command::Fetch("missing.dat")).await.unwrap();

        assert_eq!(server.connection_count(), 3);
        assert_eq!(server.requests(), vec!["LIST", "LIST", "GET"]);
    }
}
