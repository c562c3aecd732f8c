//! Outbound mail
//!
//! The platform sends mail through an HTTP relay. The sender is a trait so
//! the delivery scheduler and the synchronous paths (OTP, recovery, admin
//! send) can be exercised against a mock transport.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::MailArgs;
use crate::types::ApiError;

/// Errors from the mail transport
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail transport is not configured")]
    NotConfigured,

    #[error("{0}")]
    Transport(String),
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::NotConfigured => ApiError::ServiceUnavailable(err.to_string()),
            MailError::Transport(message) => ApiError::Transport(message),
        }
    }
}

/// Mail sending contract
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), MailError>;
}

/// Build a sender from configuration.
///
/// Falls back to a transport that rejects every send when the relay is not
/// configured; scheduled deliveries then record `failed` logs and
/// synchronous paths surface a service error, matching the error policy.
pub fn mailer_from_args(args: &MailArgs) -> std::sync::Arc<dyn MailSender> {
    match (&args.mail_api_url, &args.mail_sender) {
        (Some(url), Some(sender)) => std::sync::Arc::new(RelayMailer::new(
            url.clone(),
            args.mail_api_key.clone(),
            sender.clone(),
            Duration::from_secs(args.mail_timeout_secs),
        )),
        _ => {
            warn!("Mail relay not configured; outbound mail disabled");
            std::sync::Arc::new(UnconfiguredMailer)
        }
    }
}

/// HTTP mail relay client
pub struct RelayMailer {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    sender: String,
}

impl RelayMailer {
    pub fn new(url: String, api_key: Option<String>, sender: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            url,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl MailSender for RelayMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), MailError> {
        if recipient.is_empty() {
            return Err(MailError::Transport(
                "Recipient email is required.".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "from": self.sender,
            "to": recipient,
            "subject": subject,
            "text": body,
        });

        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(format!("Mail relay call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MailError::Transport(format!(
                "Mail relay returned {}: {}",
                status, detail
            )));
        }

        Ok(())
    }
}

/// Sender used when no relay is configured; every send fails
pub struct UnconfiguredMailer;

#[async_trait]
impl MailSender for UnconfiguredMailer {
    async fn send(
        &self,
        _recipient: &str,
        _subject: &str,
        _body: &str,
    ) -> std::result::Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mailer_rejects_sends() {
        let mailer = UnconfiguredMailer;
        let result = mailer.send("a@example.com", "Subject", "Body").await;
        assert!(matches!(result, Err(MailError::NotConfigured)));
    }

    #[test]
    fn test_mail_error_maps_to_api_error() {
        let err: ApiError = MailError::NotConfigured.into();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));

        let err: ApiError = MailError::Transport("boom".to_string()).into();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
