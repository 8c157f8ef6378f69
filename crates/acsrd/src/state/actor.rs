//! State actor - owns the alarm state and applies commands one at a time.
//!
//! The actor is the only writer of the alarm state. Each command runs its
//! whole read-compute-persist sequence before the next one is received, so
//! concurrent connections can never interleave partial updates.

use std::sync::Arc;

use acsr_core::{AlarmCommand, AlarmState, CommandStatus};
use tokio::sync::mpsc;
use tracing::{error, info};

use super::commands::{StateCommand, StateError};
use super::store::{StateStore, StoreError};

/// The state actor.
pub struct StateActor<S: StateStore> {
    receiver: mpsc::Receiver<StateCommand>,
    state: AlarmState,
    store: Arc<S>,
}

impl<S: StateStore> StateActor<S> {
    /// Creates an actor starting from `initial` (normally the loaded state).
    pub fn new(receiver: mpsc::Receiver<StateCommand>, store: S, initial: AlarmState) -> Self {
        Self {
            receiver,
            state: initial,
            store: Arc::new(store),
        }
    }

    /// Runs the actor until every handle has been dropped.
    pub async fn run(mut self) {
        info!(state = %self.state, "State machine starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(state = %self.state, "State machine stopped");
    }

    async fn handle_command(&mut self, cmd: StateCommand) {
        match cmd {
            StateCommand::Execute {
                command,
                respond_to,
            } => {
                let result = self.handle_execute(command).await;
                // Caller may have gone away; the transition still stands
                let _ = respond_to.send(result);
            }
            StateCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state);
            }
        }
    }

    async fn handle_execute(&mut self, command: AlarmCommand) -> Result<CommandStatus, StateError> {
        let previous = self.state;
        let transition = previous.apply(command);

        if transition.is_skipped() {
            info!(
                command = %command,
                state = %previous,
                "Command skipped, system not auto-armed"
            );
            return Ok(transition.status);
        }

        // Persist before committing; on failure the old state stays current
        if let Err(e) = self.persist(transition.next).await {
            error!(
                command = %command,
                state = %previous,
                attempted = %transition.next,
                error = %e,
                "Failed to persist state, transition rolled back"
            );
            return Err(StateError::PersistFailed(e.to_string()));
        }

        self.state = transition.next;

        info!(
            command = %command,
            previous = %previous,
            state = %self.state,
            status = %transition.status,
            "Command applied"
        );

        Ok(transition.status)
    }

    /// Saves on the blocking pool; the actor still waits, so saves never overlap.
    async fn persist(&self, state: AlarmState) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(state))
            .await
            .map_err(|e| StoreError::Unavailable(format!("save task failed: {e}")))?
    }
}
