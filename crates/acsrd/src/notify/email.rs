//! SMTP email channel.
//!
//! Sends the composed message as `multipart/alternative` with identical
//! plain-text and HTML parts. STARTTLS is required when `tls` is set,
//! otherwise the session stays in plaintext. Credentials are always sent.

use acsr_core::EventBatch;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{DeliveryError, NotificationChannel, NotificationOutcome};
use crate::config::EmailConfig;

/// Delivers notifications through an SMTP server.
pub struct EmailChannel {
    config: EmailConfig,
    from: Mailbox,
    to: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    /// Creates the channel; addresses and TLS settings are checked here.
    ///
    /// # Errors
    ///
    /// `DeliveryError::Build` if `from` or `notification_email` is not a
    /// valid mailbox, or TLS parameters cannot be created for the server.
    pub fn new(config: EmailConfig) -> Result<Self, DeliveryError> {
        let to: Mailbox = config.notification_email.parse().map_err(|e| {
            DeliveryError::Build(format!("recipient {}: {e}", config.notification_email))
        })?;
        let from = sender(&config, &to)?;

        let tls = if config.tls {
            let params = TlsParameters::new(config.server_address.clone())
                .map_err(|e| DeliveryError::Build(format!("tls parameters: {e}")))?;
            Tls::Required(params)
        } else {
            Tls::None
        };

        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.server_address.as_str())
                .port(config.port)
                .tls(tls)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build();

        Ok(Self {
            config,
            from,
            to,
            transport,
        })
    }

    /// Builds the email for a batch without sending it.
    pub fn build_message(&self, batch: &EventBatch) -> Result<Message, DeliveryError> {
        let body = batch.compose()?;

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.config.notification_subject.clone())
            .multipart(MultiPart::alternative_plain_html(body.clone(), body))
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

/// Picks the `From` mailbox: `from` if set, else the login when it is an
/// address, else the recipient.
fn sender(config: &EmailConfig, to: &Mailbox) -> Result<Mailbox, DeliveryError> {
    if let Some(from) = &config.from {
        return from
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::Build(format!("sender {from}: {e}")));
    }

    match config.username.parse::<Mailbox>() {
        Ok(mailbox) => Ok(mailbox),
        Err(_) => {
            debug!(
                username = %config.username,
                "SMTP login is not an address, sending from the recipient"
            );
            Ok(to.clone())
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, batch: &EventBatch) -> NotificationOutcome {
        let message = self.build_message(batch)?;

        info!(
            server = %self.config.server_address,
            port = self.config.port,
            tls = self.config.tls,
            events = batch.len(),
            "Sending email"
        );

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        debug!(code = %response.code(), "SMTP server accepted message");
        info!("Email send complete");
        Ok(())
    }
}
