//! Driven port for the transactional e-mail provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;

define_port_error! {
    pub enum EmailSenderError {
        Transport { message: String } => "email provider transport failed: {message}",
        Rejected { status: u16, message: String } => "email provider rejected message ({status}): {message}",
    }
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Deliver later instead of immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError>;
}

/// Sender that drops every message, for deployments without an e-mail key.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError> {
        tracing::debug!(subject = %message.subject, "e-mail delivery disabled; dropping message");
        Ok(())
    }
}
