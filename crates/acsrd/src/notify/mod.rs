//! Notification channels and the batch dispatcher.
//!
//! Every configured channel receives every batch. Each send runs in its
//! own task, so a failing, hung or panicking channel only affects its own
//! delivery of that batch. Outcomes are logged and never reported back to
//! the event source.

use std::sync::Arc;

use acsr_core::{DomainError, EventBatch};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::AlarmdConfig;

mod dispatcher;
mod email;
mod log_channel;

pub use dispatcher::{spawn_dispatcher, DispatchError, DispatcherHandle};
pub use email::EmailChannel;
pub use log_channel::LogChannel;

/// Result of one channel delivering one batch.
pub type NotificationOutcome = Result<(), DeliveryError>;

/// Errors raised while delivering a notification.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("cannot compose message: {0}")]
    Compose(#[from] DomainError),

    #[error("cannot build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("channel task panicked: {0}")]
    Panicked(String),
}

/// A delivery mechanism for alarm notifications (email, SMS, push, ...).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one batch. Failures are returned, never raised.
    async fn send(&self, batch: &EventBatch) -> NotificationOutcome;
}

/// Shared, type-erased channel.
pub type SharedChannel = Arc<dyn NotificationChannel>;

/// Builds the channels enabled in the configuration.
///
/// # Errors
///
/// Returns `DeliveryError::Build` if an enabled channel's settings cannot be
/// turned into a working client (for example an unparsable address).
pub fn build_channels(config: &AlarmdConfig) -> Result<Vec<SharedChannel>, DeliveryError> {
    let mut channels: Vec<SharedChannel> = Vec::new();

    if let Some(email) = &config.email {
        channels.push(Arc::new(EmailChannel::new(email.clone())?));
    }

    if config.log_channel_enabled() {
        channels.push(Arc::new(LogChannel::new()));
    }

    info!(
        channels = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Notification channels configured"
    );

    Ok(channels)
}
