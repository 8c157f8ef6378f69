//! ACSR Control - client side of `alarm-ctl`
//!
//! This library provides:
//! - `client` - One-shot control socket client with timeouts
//! - `privilege` - Trusted-principal check
//! - `error` - Transport and CLI error types
//!
//! `run_command` ties them together in the order the CLI needs: the
//! privilege check happens before any connection is opened.

pub mod client;
pub mod error;
pub mod privilege;

pub use client::{resolve_socket_path, ClientConfig, ControlClient, DEFAULT_TIMEOUT};
pub use error::{CtlError, Result, TransportError};
pub use privilege::{check_trusted_principal, effective_uid, is_trusted_principal};

use acsr_core::AlarmCommand;
use acsr_protocol::ControlResponse;
use tracing::debug;

/// Checks the caller, sends `command` and returns the status text.
///
/// # Errors
///
/// - `CtlError::Privilege` if `euid` is not trusted; nothing is sent
/// - `CtlError::Transport` if the exchange failed
/// - `CtlError::Rejected` with the daemon's `error` text
pub async fn run_command(
    command: AlarmCommand,
    euid: u32,
    client: &ControlClient,
) -> Result<String> {
    check_trusted_principal(euid)?;

    match client.send_command(command).await? {
        ControlResponse::Status(status) => {
            debug!(command = %command, status = %status, "Command accepted");
            Ok(status)
        }
        ControlResponse::Error(error) => Err(CtlError::Rejected(error)),
    }
}
