//! Error types for `alarm-ctl`.
//!
//! A `TransportError` means the outcome of a command is unknown: the daemon
//! could not be reached or its answer could not be read. A `CtlError::Rejected`
//! means the daemon answered and refused or failed the command.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to complete one request/response exchange with the daemon.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No socket at the configured path.
    ///
    /// The daemon is not running, or `--socket` / `ACSR_SOCKET` points
    /// somewhere else.
    #[error("daemon socket not found at {path}")]
    NotFound { path: PathBuf },

    /// A socket exists but nobody is accepting on it.
    #[error("connection refused at {path}")]
    ConnectionRefused { path: PathBuf },

    #[error("timed out after {after:?} waiting for the daemon")]
    Timeout { after: Duration },

    /// The daemon closed the connection without answering.
    #[error("daemon closed the connection without a response")]
    NoResponse,

    #[error("malformed response from daemon: {0}")]
    MalformedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classifies a failed `connect` on `path`.
    pub fn from_connect(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused { path },
            _ => Self::Io(err),
        }
    }
}

/// Everything that makes `alarm-ctl` exit with a failure.
///
/// The `Display` text is exactly what the CLI prints on stderr.
#[derive(Error, Debug)]
pub enum CtlError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon's response carried an `error` field.
    #[error("Error: {0}")]
    Rejected(String),

    /// The caller is not the trusted principal.
    #[error("Error: alarm-ctl must run as root - exiting")]
    Privilege { euid: u32 },
}

pub type Result<T> = std::result::Result<T, CtlError>;
