//! Reqwest-backed transactional e-mail sender.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::Serialize;
use zeroize::Zeroizing;

use super::http_support::{client_with_timeout, join_path, status_message};
use crate::domain::ports::{EmailMessage, EmailSender, EmailSenderError};

const SEND_PATH: &str = "emails";

/// Endpoint, key and sender address of the e-mail provider.
#[derive(Clone)]
pub struct EmailProviderConfig {
    pub api_base: Url,
    pub api_key: Zeroizing<String>,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_at: Option<String>,
}

impl<'a> SendRequest<'a> {
    fn new(from: &'a str, message: &'a EmailMessage) -> Self {
        Self {
            from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            scheduled_at: message.scheduled_at.map(rfc3339),
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// [`EmailSender`] posting to the provider's send endpoint.
pub struct HttpEmailSender {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
    from: String,
}

impl HttpEmailSender {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the endpoint
    /// URL is invalid.
    pub fn new(config: EmailProviderConfig) -> Result<Self, EmailSenderError> {
        let client = client_with_timeout(config.timeout)
            .map_err(|error| EmailSenderError::transport(error.to_string()))?;
        let endpoint = join_path(&config.api_base, SEND_PATH)
            .map_err(|error| EmailSenderError::transport(format!("invalid api base: {error}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
            from: config.from,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.as_str())
            .json(&SendRequest::new(&self.from, message))
            .send()
            .await
            .map_err(|error| EmailSenderError::transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .bytes()
            .await
            .map_err(|error| EmailSenderError::transport(error.to_string()))?;
        Err(EmailSenderError::rejected(
            status.as_u16(),
            status_message(status, body.as_ref()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn message(scheduled_at: Option<DateTime<Utc>>) -> EmailMessage {
        EmailMessage {
            to: "sam@example.com".to_owned(),
            subject: "Your song is ready".to_owned(),
            html: "<p>hi</p>".to_owned(),
            scheduled_at,
        }
    }

    #[test]
    fn immediate_messages_omit_the_schedule() {
        let msg = message(None);
        let body = serde_json::to_value(SendRequest::new("songs@example.com", &msg))
            .expect("serialises");
        assert_eq!(
            body,
            json!({
                "from": "songs@example.com",
                "to": ["sam@example.com"],
                "subject": "Your song is ready",
                "html": "<p>hi</p>",
            })
        );
    }

    #[test]
    fn scheduled_messages_carry_an_rfc3339_instant() {
        let at = Utc
            .with_ymd_and_hms(2027, 5, 25, 9, 0, 0)
            .single()
            .expect("valid instant");
        let msg = message(Some(at));
        let body = serde_json::to_value(SendRequest::new("songs@example.com", &msg))
            .expect("serialises");
        assert_eq!(body["scheduled_at"], "2027-05-25T09:00:00Z");
    }
}
