//! Event collector: groups alarm events into batches.
//!
//! A batch is flushed when it reaches `max_batch_size` events or when
//! `max_window` has passed since its first event, whichever comes first.
//! Shutdown (cancellation or every handle dropped) flushes the partial
//! batch. Flushing hands the batch to the dispatcher without waiting.

use std::fmt;

use acsr_core::{AlarmEvent, EventBatch};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BatchingConfig;
use crate::notify::DispatcherHandle;

/// Buffer between the panel interface and the collector
const EVENT_BUFFER: usize = 256;

/// Errors returned to the event source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("event collector stopped")]
    Closed,
}

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Size,
    Window,
    Shutdown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "size"),
            Self::Window => write!(f, "window"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Handle used by the panel interface to report events.
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<AlarmEvent>,
}

impl CollectorHandle {
    /// Reports one alarm event.
    ///
    /// # Errors
    ///
    /// `CollectorError::Closed` if the collector has shut down.
    pub async fn submit(&self, event: AlarmEvent) -> Result<(), CollectorError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| CollectorError::Closed)
    }
}

/// Spawns the collector task.
pub fn spawn_collector(
    config: BatchingConfig,
    dispatcher: DispatcherHandle,
    cancel_token: CancellationToken,
) -> (CollectorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let collector = EventCollector::new(rx, config, dispatcher, cancel_token);
    let task = tokio::spawn(collector.run());
    (CollectorHandle { sender: tx }, task)
}

struct EventCollector {
    receiver: mpsc::Receiver<AlarmEvent>,
    config: BatchingConfig,
    dispatcher: DispatcherHandle,
    cancel_token: CancellationToken,
    batch: EventBatch,
    /// Window deadline of the current batch; set by its first event
    deadline: Option<Instant>,
}

impl EventCollector {
    fn new(
        receiver: mpsc::Receiver<AlarmEvent>,
        config: BatchingConfig,
        dispatcher: DispatcherHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            config,
            dispatcher,
            cancel_token,
            batch: EventBatch::new(),
            deadline: None,
        }
    }

    async fn run(mut self) {
        info!(
            max_batch_size = self.config.max_batch_size,
            max_window_ms = self.config.max_window_ms,
            "Event collector starting"
        );

        loop {
            let deadline = self.deadline;
            let window = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    self.drain_pending();
                    self.flush(FlushReason::Shutdown);
                    break;
                }

                _ = window => {
                    self.flush(FlushReason::Window);
                }

                event = self.receiver.recv() => {
                    match event {
                        Some(event) => self.accept(event),
                        None => {
                            self.flush(FlushReason::Shutdown);
                            break;
                        }
                    }
                }
            }
        }

        info!("Event collector stopped");
    }

    /// Stops intake and accepts events already buffered in the channel.
    fn drain_pending(&mut self) {
        self.receiver.close();
        while let Ok(event) = self.receiver.try_recv() {
            self.accept(event);
        }
    }

    fn accept(&mut self, event: AlarmEvent) {
        info!(
            event_type = %event.event_type,
            description = %event.description,
            timestamp = %event.timestamp,
            "Alarm event received"
        );

        if self.batch.is_empty() {
            self.deadline = Some(Instant::now() + self.config.max_window());
        }
        self.batch.push(event);

        if self.batch.len() >= self.config.max_batch_size {
            self.flush(FlushReason::Size);
        }
    }

    fn flush(&mut self, reason: FlushReason) {
        self.deadline = None;
        let batch = std::mem::take(&mut self.batch);
        if batch.is_empty() {
            return;
        }

        debug!(events = batch.len(), reason = %reason, "Flushing batch");

        if let Err(e) = self.dispatcher.dispatch(batch) {
            warn!(error = %e, reason = %reason, "Batch not dispatched");
        }
    }
}
