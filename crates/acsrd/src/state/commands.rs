//! State actor commands and errors.

use acsr_core::{AlarmCommand, AlarmState, CommandStatus};
use thiserror::Error;
use tokio::sync::oneshot;

/// Messages sent to the state actor.
///
/// Each message carries a oneshot channel for the reply, so callers await
/// the result of their own command and nothing else.
#[derive(Debug)]
pub enum StateCommand {
    /// Apply one control command and persist the outcome.
    ///
    /// # Errors
    /// - `StateError::PersistFailed` if the new state could not be saved;
    ///   the in-memory state is left as it was before the command
    Execute {
        command: AlarmCommand,
        respond_to: oneshot::Sender<Result<CommandStatus, StateError>>,
    },

    /// Read the current state.
    GetState {
        respond_to: oneshot::Sender<AlarmState>,
    },
}

/// Errors that can occur while applying a command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// The transition was computed but could not be durably recorded.
    #[error("state persist failed: {0}")]
    PersistFailed(String),

    /// The actor has shut down.
    #[error("state machine channel closed")]
    ChannelClosed,
}
