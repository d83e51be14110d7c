//! Delivery of rendered alerts.
//!
//! The coordinator only needs `send(recipient, subject, body, primary_link)`
//! with a success or error outcome. Transport lives behind [`Notifier`]:
//! [`LogNotifier`] writes the message to the log, [`WebhookNotifier`] posts
//! a signed [`NotificationPayload`] to a relay that owns the real channel.

#[cfg(test)]
pub mod memory;
pub mod render;

pub use render::{RenderedMessage, render_batch};

use async_trait::async_trait;
use courtwatch_sdk::objects::NotificationPayload;
use courtwatch_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum NotifierError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The relay answered with a non-success status
    #[error("delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The notifier refused the message (used by test doubles)
    #[error("notifier rejected message: {0}")]
    Rejected(String),
}

/// A message ready to be handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub primary_link: Option<String>,
    pub slot_count: usize,
}

impl OutgoingMessage {
    pub fn new(recipient: impl Into<String>, rendered: RenderedMessage, slot_count: usize) -> Self {
        Self {
            recipient: recipient.into(),
            subject: rendered.subject,
            body: rendered.body,
            primary_link: rendered.primary_link,
            slot_count,
        }
    }

    fn into_payload(self) -> NotificationPayload {
        NotificationPayload {
            recipient: self.recipient,
            subject: self.subject,
            body: self.body,
            primary_link: self.primary_link,
            slot_count: self.slot_count,
            sent_at: time::OffsetDateTime::now_utc(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifierError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifierError> {
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            slot_count = message.slot_count,
            primary_link = message.primary_link.as_deref().unwrap_or(""),
            "Notification (log only)"
        );
        debug!(body = %message.body, "Notification body");
        Ok(())
    }
}

/// Posts signed notification payloads to a relay endpoint.
pub struct WebhookNotifier {
    url: Url,
    secret: Box<[u8]>,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: Url, secret: &[u8], timeout: Duration) -> Self {
        Self {
            url,
            secret: secret.to_owned().into_boxed_slice(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifierError> {
        let signed = SignedObject::new(message.clone().into_payload(), &self.secret)?;

        let response = self
            .http_client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient = %message.recipient, %status, "Relay accepted notification");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifierError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}
