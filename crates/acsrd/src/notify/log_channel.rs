//! Channel that writes notifications to the daemon log.

use acsr_core::EventBatch;
use async_trait::async_trait;
use tracing::info;

use super::{NotificationChannel, NotificationOutcome};

/// Writes each composed message through `tracing`.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, batch: &EventBatch) -> NotificationOutcome {
        let message = batch.compose()?;
        info!(events = batch.len(), message = %message, "Alarm notification");
        Ok(())
    }
}
