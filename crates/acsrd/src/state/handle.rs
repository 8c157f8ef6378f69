//! Client interface for interacting with the StateActor.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `StateError::ChannelClosed`.

use acsr_core::{AlarmCommand, AlarmState, CommandStatus};
use tokio::sync::{mpsc, oneshot};

use super::commands::{StateCommand, StateError};

/// Cheap-to-clone handle to the state actor.
#[derive(Clone)]
pub struct StateHandle {
    sender: mpsc::Sender<StateCommand>,
}

impl StateHandle {
    pub fn new(sender: mpsc::Sender<StateCommand>) -> Self {
        Self { sender }
    }

    /// Applies a command and waits until it is persisted.
    ///
    /// # Errors
    ///
    /// - `StateError::PersistFailed` if the transition could not be saved
    /// - `StateError::ChannelClosed` if the actor has shut down
    pub async fn execute(&self, command: AlarmCommand) -> Result<CommandStatus, StateError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StateCommand::Execute {
                command,
                respond_to: tx,
            })
            .await
            .map_err(|_| StateError::ChannelClosed)?;

        rx.await.map_err(|_| StateError::ChannelClosed)?
    }

    /// Returns the current state, or `None` if the actor is gone.
    pub async fn current(&self) -> Option<AlarmState> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StateCommand::GetState { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (StateHandle, mpsc::Receiver<StateCommand>) {
        let (tx, rx) = mpsc::channel(4);
        (StateHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn test_execute_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let actor = tokio::spawn(async move {
            if let Some(StateCommand::Execute {
                command,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(command, AlarmCommand::Arm);
                let _ = respond_to.send(Ok(CommandStatus::Armed));
                return true;
            }
            false
        });

        assert_eq!(handle.execute(AlarmCommand::Arm).await, Ok(CommandStatus::Armed));
        assert!(actor.await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_channel_closed() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert_eq!(
            handle.execute(AlarmCommand::Disarm).await,
            Err(StateError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_dropped_reply_is_channel_closed() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            // Receive and drop the responder without answering
            let _ = rx.recv().await;
        });

        assert_eq!(
            handle.execute(AlarmCommand::Arm).await,
            Err(StateError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_current_none_when_closed() {
        let (handle, rx) = create_test_handle();
        drop(rx);
        assert_eq!(handle.current().await, None);
    }
}
