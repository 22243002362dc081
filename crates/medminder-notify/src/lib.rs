//! Outbound email and SMS delivery.
//!
//! The reminder sweep only sees the [`Notifier`] trait. Each channel is backed
//! by its own transport so a missing credential for one channel does not
//! disable the other.

pub mod email;
pub mod sms;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use email::{EmailTransport, MailApiConfig};
pub use sms::{KudiSmsConfig, SmsTransport};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}

/// Routes each channel to its configured transport.
pub struct DispatchNotifier {
    client: reqwest::Client,
    email: EmailTransport,
    sms: SmsTransport,
}

impl DispatchNotifier {
    pub fn new(email: EmailTransport, sms: SmsTransport) -> Self {
        info!("Notifier: email via {}, sms via {}", email.name(), sms.name());
        Self {
            client: reqwest::Client::new(),
            email,
            sms,
        }
    }

    /// Both channels only log. Used when no provider is configured.
    pub fn log_only() -> Self {
        Self::new(EmailTransport::Log, SmsTransport::Log)
    }
}

#[async_trait]
impl Notifier for DispatchNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if !to.contains('@') {
            return Err(NotifyError::InvalidRecipient(to.to_string()));
        }
        self.email.send(&self.client, to, subject, body).await
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        if to.trim().is_empty() {
            return Err(NotifyError::InvalidRecipient(to.to_string()));
        }
        self.sms.send(&self.client, to, body).await
    }
}
