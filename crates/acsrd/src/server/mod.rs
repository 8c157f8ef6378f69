//! Unix socket control server for the alarm daemon.
//!
//! The server:
//! - Listens on a Unix socket for `alarm-ctl` connections
//! - Spawns a ConnectionHandler for each client
//! - Serves one request and one response per connection
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐  execute  ┌─────────────────┐
//! │ConnectionHandler│──────────▶│   StateHandle   │
//! │   (per client)  │◀──────────│                 │
//! └─────────────────┘  status   └─────────────────┘
//! ```
//!
//! Commands from concurrent connections are serialized by the state actor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Server errors are logged and allow continued operation

mod connection;
mod peer;

pub use connection::{handle_request, response_for, ConnectionError, ConnectionHandler};
pub use peer::{effective_uid, PeerPolicy};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DaemonSettings;
use crate::state::StateHandle;

pub use acsr_protocol::DEFAULT_SOCKET_PATH;

/// How long shutdown waits for in-flight exchanges
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Unix socket server for the alarm daemon.
pub struct DaemonServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    /// Permission bits applied to the socket file after bind
    socket_mode: u32,

    /// Who may issue commands
    policy: Arc<PeerPolicy>,

    /// Handle to the alarm state machine
    state: StateHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: AtomicU64,
}

impl DaemonServer {
    /// Creates a server with the default socket mode and peer policy.
    ///
    /// # Arguments
    ///
    /// * `socket_path` - Path where the Unix socket will be created
    /// * `state` - Handle to the alarm state machine
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        socket_path: impl Into<PathBuf>,
        state: StateHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        let defaults = DaemonSettings::default();
        Self {
            socket_path: socket_path.into(),
            socket_mode: defaults.socket_mode,
            policy: Arc::new(PeerPolicy::from_settings(&defaults)),
            state,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Creates a server from the `[daemon]` configuration section.
    pub fn from_settings(
        settings: &DaemonSettings,
        state: StateHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self::new(settings.socket_path.clone(), state, cancel_token)
            .with_socket_mode(settings.socket_mode)
            .with_peer_policy(PeerPolicy::from_settings(settings))
    }

    pub fn with_socket_mode(mut self, mode: u32) -> Self {
        self.socket_mode = mode;
        self
    }

    pub fn with_peer_policy(mut self, policy: PeerPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered,
    /// then waits briefly for in-flight exchanges and removes the socket.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;

        info!(
            socket = %self.socket_path.display(),
            mode = format_args!("{:o}", self.socket_mode),
            "Daemon server listening"
        );

        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection handler failed");
                    }
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            handlers.spawn(self.handler_for(stream, conn_num).run());
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.drain(handlers).await;
        self.cleanup();
        Ok(())
    }

    fn bind(&self) -> Result<UnixListener, ServerError> {
        let setup_error = |e: std::io::Error| ServerError::SocketSetup {
            path: self.socket_path.clone(),
            error: e.to_string(),
        };

        // Remove a stale socket left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(setup_error)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(setup_error)?;

        std::fs::set_permissions(
            &self.socket_path,
            std::fs::Permissions::from_mode(self.socket_mode),
        )
        .map_err(setup_error)?;

        Ok(listener)
    }

    fn handler_for(&self, stream: UnixStream, connection_number: u64) -> ConnectionHandler {
        ConnectionHandler::new(
            stream,
            self.state.clone(),
            Arc::clone(&self.policy),
            connection_number,
        )
    }

    async fn drain(&self, mut handlers: JoinSet<()>) {
        if handlers.is_empty() {
            return;
        }

        debug!(in_flight = handlers.len(), "Waiting for open connections");
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while handlers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                in_flight = handlers.len(),
                "Aborting connections still open at shutdown"
            );
            handlers.abort_all();
        }
    }

    /// Removes the socket file.
    fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{spawn_state_machine, MemoryStore};

    #[test]
    fn test_default_socket_path() {
        assert_eq!(DEFAULT_SOCKET_PATH, "/tmp/alarmd.sock");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::SocketSetup {
            path: PathBuf::from("/tmp/test.sock"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_socket_mode_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("nested").join("alarmd.sock");
        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let cancel = CancellationToken::new();

        let server = DaemonServer::new(socket_path.clone(), state, cancel.clone())
            .with_socket_mode(0o660);
        let task = tokio::spawn(async move { server.run().await });

        let mut mode = 0;
        for _ in 0..50 {
            if let Ok(meta) = std::fs::metadata(&socket_path) {
                mode = meta.permissions().mode() & 0o777;
                if mode == 0o660 {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mode, 0o660);

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("alarmd.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let state = spawn_state_machine(MemoryStore::new()).unwrap();
        let cancel = CancellationToken::new();
        let server = DaemonServer::new(socket_path.clone(), state, cancel.clone());
        let task = tokio::spawn(async move { server.run().await });

        let mut connected = false;
        for _ in 0..50 {
            if UnixStream::connect(&socket_path).await.is_ok() {
                connected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(connected);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
