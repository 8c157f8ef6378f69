//! Connection handler for individual `alarm-ctl` connections.
//!
//! Each connection carries exactly one exchange:
//! - Check the peer's credentials
//! - Read one request line
//! - Execute the command against the state machine
//! - Write one response line and close
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in a closed connection

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use acsr_core::CommandStatus;
use acsr_protocol::{decode_request, encode_response, ControlResponse, MAX_MESSAGE_SIZE};

use super::PeerPolicy;
use crate::state::{StateError, StateHandle};

/// Read timeout for the request line
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Write timeout for the response line
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error text when the state machine task is gone
const STATE_UNAVAILABLE: &str = "state machine unavailable";

/// Handler for a single control connection.
pub struct ConnectionHandler {
    stream: UnixStream,
    state: StateHandle,
    policy: Arc<PeerPolicy>,
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        stream: UnixStream,
        state: StateHandle,
        policy: Arc<PeerPolicy>,
        connection_number: u64,
    ) -> Self {
        Self {
            stream,
            state,
            policy,
            connection_number,
        }
    }

    /// Runs the exchange. Returns when the connection is closed.
    pub async fn run(self) {
        let connection = self.connection_number;
        debug!(connection, "New client connected");

        match self.exchange().await {
            Ok(()) => debug!(connection, "Client disconnected"),
            Err(ConnectionError::Eof) => debug!(connection, "Client closed without a request"),
            Err(e) => debug!(connection, error = %e, "Connection closed"),
        }
    }

    async fn exchange(self) -> Result<(), ConnectionError> {
        let peer = self.policy.check(&self.stream);

        let (reader, mut writer) = self.stream.into_split();

        if let Err(e) = peer {
            if matches!(e, ConnectionError::PermissionDenied { .. }) {
                send_response(&mut writer, &ControlResponse::permission_denied()).await?;
            }
            return Err(e);
        }

        let line = match timeout(READ_TIMEOUT, read_request_line(reader)).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        let response = handle_request(&line, &self.state).await;
        send_response(&mut writer, &response).await?;

        let _ = writer.shutdown().await;
        Ok(())
    }
}

/// Decodes one request line and executes it.
///
/// Undecodable input, a missing command and an unknown command all answer
/// `unknown command` without reaching the state machine.
pub async fn handle_request(line: &str, state: &StateHandle) -> ControlResponse {
    let request = match decode_request(line) {
        Ok(request) => request,
        Err(e) => {
            info!(error = %e, "Rejected request");
            return ControlResponse::unknown_command();
        }
    };

    debug!(command = %request.command, "Received command");
    response_for(state.execute(request.command).await)
}

/// Maps the state machine's answer onto the wire response.
pub fn response_for(result: Result<CommandStatus, StateError>) -> ControlResponse {
    match result {
        Ok(status) => ControlResponse::status(status),
        Err(StateError::PersistFailed(_)) => ControlResponse::persist_failed(),
        Err(StateError::ChannelClosed) => {
            error!("State machine unavailable");
            ControlResponse::error(STATE_UNAVAILABLE)
        }
    }
}

/// Reads up to one line, capped one byte past the message limit so that an
/// oversize request still reaches the decoder and is rejected there.
async fn read_request_line(reader: OwnedReadHalf) -> Result<String, ConnectionError> {
    let mut limited = BufReader::new(reader).take(MAX_MESSAGE_SIZE as u64 + 1);
    let mut buf = Vec::new();

    let bytes_read = limited
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| ConnectionError::Io(e.to_string()))?;

    if bytes_read == 0 {
        return Err(ConnectionError::Eof);
    }

    // Invalid UTF-8 is replaced and then fails JSON decoding
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn send_response(
    writer: &mut OwnedWriteHalf,
    response: &ControlResponse,
) -> Result<(), ConnectionError> {
    let line = encode_response(response).map_err(|e| ConnectionError::Encode(e.to_string()))?;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to write response");
            Err(ConnectionError::Io(e.to_string()))
        }
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Peer uid {uid} is not allowed to issue commands")]
    PermissionDenied { uid: u32 },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{spawn_state_machine, MemoryStore};
    use acsr_core::{AlarmState, Provenance};

    async fn exchange(policy: PeerPolicy, state: StateHandle, request: &[u8]) -> String {
        let (server, client) = UnixStream::pair().unwrap();
        let handler = ConnectionHandler::new(server, state, Arc::new(policy), 0);
        let task = tokio::spawn(handler.run());

        let (reader, mut writer) = client.into_split();
        // A rejected peer may be answered before the request is written
        let _ = writer.write_all(request).await;

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        task.await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let line = exchange(PeerPolicy::default(), state.clone(), b"{\"command\":\"arm\"}\n").await;

        assert_eq!(line, "{\"status\":\"armed\"}\n");
        assert_eq!(
            state.current().await,
            Some(AlarmState::Armed(Provenance::Manual))
        );
    }

    #[tokio::test]
    async fn test_garbage_is_unknown_command() {
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let line = exchange(PeerPolicy::default(), state.clone(), b"not json\n").await;

        assert_eq!(line, "{\"error\":\"unknown command\"}\n");
        assert_eq!(state.current().await, Some(AlarmState::Disarmed));
    }

    #[tokio::test]
    async fn test_untrusted_peer_denied_without_mutation() {
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let line = exchange(
            PeerPolicy::trusting_nobody(),
            state.clone(),
            b"{\"command\":\"arm\"}\n",
        )
        .await;

        assert_eq!(line, "{\"error\":\"permission denied\"}\n");
        assert_eq!(state.current().await, Some(AlarmState::Disarmed));
    }

    #[tokio::test]
    async fn test_oversize_request_rejected() {
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let mut request = b"{\"command\":\"arm\",\"pad\":\"".to_vec();
        request.extend(std::iter::repeat(b'x').take(MAX_MESSAGE_SIZE));
        request.extend_from_slice(b"\"}\n");

        let line = exchange(PeerPolicy::default(), state.clone(), &request).await;

        assert_eq!(line, "{\"error\":\"unknown command\"}\n");
        assert_eq!(state.current().await, Some(AlarmState::Disarmed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_client_times_out() {
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let (server, client) = UnixStream::pair().unwrap();
        let handler = ConnectionHandler::new(server, state, Arc::new(PeerPolicy::default()), 0);
        let task = tokio::spawn(handler.run());

        // No request is sent; the handler gives up after the read timeout
        task.await.unwrap();

        let mut line = String::new();
        let n = BufReader::new(client).read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_response_mapping() {
        assert_eq!(
            response_for(Ok(CommandStatus::Skipped)),
            ControlResponse::Status("skipped".to_string())
        );
        assert_eq!(
            response_for(Err(StateError::PersistFailed("disk full".to_string()))),
            ControlResponse::persist_failed()
        );
        assert_eq!(
            response_for(Err(StateError::ChannelClosed)),
            ControlResponse::error(STATE_UNAVAILABLE)
        );
    }
}
