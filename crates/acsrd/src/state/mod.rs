//! Alarm state machine using Actor pattern.
//!
//! The actor is the single owner of the armed/disarmed state. Connections
//! send it commands over an mpsc channel and receive the outcome on a
//! oneshot channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   StateCommand    ┌─────────────────┐   save    ┌────────────┐
//! │ConnectionHandler│──────────────────▶│   StateActor    │──────────▶│ StateStore │
//! │  (per client)   │◀──────────────────│ (AlarmState)    │           └────────────┘
//! └─────────────────┘  CommandStatus    └─────────────────┘
//! ```

use acsr_core::AlarmState;
use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;
mod store;

pub use actor::StateActor;
pub use commands::{StateCommand, StateError};
pub use handle::StateHandle;
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 32;

/// Loads the persisted state and spawns the state actor.
///
/// A store that has never been written starts the system `Disarmed`.
///
/// # Errors
///
/// Returns the store error if the persisted state exists but cannot be read.
/// Starting from a default would silently forget an armed system.
pub fn spawn_state_machine<S: StateStore>(store: S) -> Result<StateHandle, StoreError> {
    let initial = store.load()?.unwrap_or_default();

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = StateActor::new(cmd_rx, store, initial);
    tokio::spawn(actor.run());

    Ok(StateHandle::new(cmd_tx))
}
