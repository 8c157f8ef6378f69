//! Control socket client.
//!
//! One call to `send_command` is one connection: connect, write the request
//! line, read the response line, close. Nothing is retried.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use acsr_core::AlarmCommand;
use acsr_protocol::{
    decode_response, encode_request, ControlRequest, ControlResponse, DEFAULT_SOCKET_PATH,
    MAX_MESSAGE_SIZE, SOCKET_ENV,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::TransportError;

/// Default connect and response timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Picks the socket path: explicit value, else `ACSR_SOCKET`, else the default.
pub fn resolve_socket_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(SOCKET_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Connection settings for the control client.
///
/// # Example
///
/// ```rust
/// use acsr_ctl::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     socket_path: std::path::PathBuf::from("/run/alarmd.sock"),
///     response_timeout: Duration::from_secs(2),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the daemon's Unix socket.
    pub socket_path: PathBuf,

    /// Limit on establishing the connection.
    pub connect_timeout: Duration,

    /// Limit on writing the request and reading the response.
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect_timeout: DEFAULT_TIMEOUT,
            response_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Sends single commands to the daemon.
#[derive(Debug, Clone)]
pub struct ControlClient {
    config: ClientConfig,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_config(ClientConfig {
            socket_path: socket_path.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Sets both the connect and the response timeout.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.config.connect_timeout = limit;
        self.config.response_timeout = limit;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Performs one request/response exchange.
    ///
    /// An `Ok` response may still carry an `error` field; that is the
    /// daemon's answer, not a transport failure.
    ///
    /// # Errors
    ///
    /// Any `TransportError`: the outcome of the command is unknown.
    pub async fn send_command(
        &self,
        command: AlarmCommand,
    ) -> Result<ControlResponse, TransportError> {
        let path = &self.config.socket_path;
        debug!(socket = %path.display(), command = %command, "Sending command");

        let stream = match timeout(self.config.connect_timeout, UnixStream::connect(path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::from_connect(path, e)),
            Err(_) => {
                return Err(TransportError::Timeout {
                    after: self.config.connect_timeout,
                })
            }
        };

        let request = encode_request(&ControlRequest::new(command))
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        let line = match timeout(self.config.response_timeout, exchange(stream, &request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TransportError::Timeout {
                    after: self.config.response_timeout,
                })
            }
        };

        let response =
            decode_response(&line).map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        debug!(response = ?response, "Received response");
        Ok(response)
    }
}

async fn exchange(stream: UnixStream, request: &str) -> Result<String, TransportError> {
    let (reader, mut writer) = stream.into_split();

    writer.write_all(request.as_bytes()).await?;
    writer.flush().await?;

    let mut limited = BufReader::new(reader).take(MAX_MESSAGE_SIZE as u64 + 1);
    let mut buf = Vec::new();
    let bytes_read = limited.read_until(b'\n', &mut buf).await?;

    if bytes_read == 0 {
        return Err(TransportError::NoResponse);
    }

    String::from_utf8(buf).map_err(|e| TransportError::MalformedResponse(e.to_string()))
}
