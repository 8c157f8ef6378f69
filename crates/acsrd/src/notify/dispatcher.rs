//! Batch dispatcher: bounded intake queue fanning out to one lane per channel.
//!
//! `DispatcherHandle::dispatch` never waits. When the queue is full the
//! batch is dropped and a warning is logged. The fan-out task hands every
//! batch to each channel's lane without waiting either; a lane whose backlog
//! is full drops the batch for that channel only.
//!
//! Each lane caps its own concurrent sends with a semaphore, so a channel
//! that hangs ties up its own permits and nothing else. Once every handle is
//! dropped the lanes finish their backlog, wait for running sends and the
//! dispatcher task returns.

use std::sync::Arc;

use acsr_core::EventBatch;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{DeliveryError, NotificationOutcome, SharedChannel};
use crate::config::DispatchConfig;

/// Errors returned when a batch cannot be queued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue full, dropped batch of {events} events")]
    QueueFull { events: usize },

    #[error("dispatcher stopped")]
    Closed,
}

/// Handle used by the collector to hand off batches.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<EventBatch>,
}

impl DispatcherHandle {
    pub fn new(sender: mpsc::Sender<EventBatch>) -> Self {
        Self { sender }
    }

    /// Queues a batch for delivery without blocking.
    ///
    /// Empty batches are ignored.
    ///
    /// # Errors
    ///
    /// - `DispatchError::QueueFull` if every queue slot is taken; the batch is dropped
    /// - `DispatchError::Closed` if the dispatcher has stopped
    pub fn dispatch(&self, batch: EventBatch) -> Result<(), DispatchError> {
        if batch.is_empty() {
            debug!("Ignoring empty batch");
            return Ok(());
        }

        let events = batch.len();
        match self.sender.try_send(batch) {
            Ok(()) => {
                debug!(events, "Batch queued for dispatch");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(events, "Dispatch queue full, dropping batch");
                Err(DispatchError::QueueFull { events })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(events, "Dispatcher stopped, dropping batch");
                Err(DispatchError::Closed)
            }
        }
    }
}

/// Spawns the dispatcher and returns the handle plus the dispatcher's task.
///
/// Awaiting the returned `JoinHandle` after dropping every
/// `DispatcherHandle` waits for queued and running deliveries to finish.
pub fn spawn_dispatcher(
    config: &DispatchConfig,
    channels: Vec<SharedChannel>,
) -> (DispatcherHandle, JoinHandle<()>) {
    let capacity = config.queue_capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run_fan_out(rx, channels, capacity, config.max_workers.max(1)));
    (DispatcherHandle::new(tx), task)
}

/// Intake side of one channel's lane.
struct Lane {
    name: String,
    sender: mpsc::Sender<Arc<EventBatch>>,
}

impl Lane {
    fn offer(&self, batch: &Arc<EventBatch>) {
        match self.sender.try_send(Arc::clone(batch)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!(
                channel = %self.name,
                events = batch.len(),
                "Channel backlog full, dropping batch for this channel"
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(channel = %self.name, "Channel lane stopped, dropping batch")
            }
        }
    }
}

async fn run_fan_out(
    mut receiver: mpsc::Receiver<EventBatch>,
    channels: Vec<SharedChannel>,
    backlog: usize,
    max_workers: usize,
) {
    info!(max_workers, channels = channels.len(), "Dispatcher starting");

    let mut lane_tasks = JoinSet::new();
    let lanes: Vec<Lane> = channels
        .into_iter()
        .map(|channel| {
            let (tx, rx) = mpsc::channel(backlog);
            let name = channel.name().to_string();
            lane_tasks.spawn(run_lane(channel, rx, max_workers));
            Lane { name, sender: tx }
        })
        .collect();

    while let Some(batch) = receiver.recv().await {
        let batch = Arc::new(batch);
        for lane in &lanes {
            lane.offer(&batch);
        }
    }

    // Closing the lane senders lets each lane drain and exit
    drop(lanes);
    debug!(lanes = lane_tasks.len(), "Dispatcher draining");
    while let Some(joined) = lane_tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Channel lane failed");
        }
    }

    info!("Dispatcher stopped");
}

/// Delivers one channel's batches, at most `max_workers` at a time.
async fn run_lane(
    channel: SharedChannel,
    mut receiver: mpsc::Receiver<Arc<EventBatch>>,
    max_workers: usize,
) {
    let name = channel.name().to_string();
    let permits = Arc::new(Semaphore::new(max_workers));
    let mut sends = JoinSet::new();

    loop {
        tokio::select! {
            Some(joined) = sends.join_next(), if !sends.is_empty() => {
                log_outcome(&name, joined);
            }

            batch = receiver.recv() => {
                let Some(batch) = batch else { break };

                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };

                let channel = Arc::clone(&channel);
                sends.spawn(async move {
                    let _permit = permit;
                    let outcome = channel.send(&batch).await;
                    (batch.len(), outcome)
                });
            }
        }
    }

    while let Some(joined) = sends.join_next().await {
        log_outcome(&name, joined);
    }
    debug!(channel = %name, "Channel lane stopped");
}

fn log_outcome(channel: &str, joined: Result<(usize, NotificationOutcome), JoinError>) {
    match joined {
        Ok((events, Ok(()))) => info!(channel = %channel, events, "Notification delivered"),
        Ok((_, Err(e))) => warn!(channel = %channel, error = %e, "Notification delivery failed"),
        Err(e) => {
            let e = DeliveryError::Panicked(e.to_string());
            error!(channel = %channel, error = %e, "Notification channel panicked")
        }
    }
}
