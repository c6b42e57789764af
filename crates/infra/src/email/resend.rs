use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use notas_auth::{
    EmailError, EmailSender,
    email::{password_reset_link, verification_link},
};
use notas_core::EmailAddress;

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Serialize)]
struct ResendMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

/// Sends plain-text mail through the Resend HTTP API.
///
/// One call is one attempt; wrap it in a `RetryingEmailSender` for backoff.
#[derive(Debug, Clone)]
pub struct ResendEmailSender {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    base_url: String,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, from_email: &str, from_name: &str, base_url: impl Into<String>) -> Self {
        let from = if from_name.trim().is_empty() {
            from_email.to_string()
        } else {
            format!("{from_name} <{from_email}>")
        };
        Self {
            client: reqwest::Client::new(),
            endpoint: RESEND_ENDPOINT.to_string(),
            api_key: api_key.into(),
            from,
            base_url: base_url.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn send(&self, to: &EmailAddress, subject: &str, text: String) -> Result<(), EmailError> {
        let message = ResendMessage {
            from: &self.from,
            to: [to.as_str()],
            subject,
            text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| EmailError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %to, subject, "email sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

/// Rate limiting and server errors are retryable; any other rejection is not.
pub(crate) fn classify(status: StatusCode, body: &str) -> EmailError {
    let detail = format!("provider returned {status}: {body}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        EmailError::Transient(detail)
    } else {
        EmailError::Permanent(detail)
    }
}

fn verification_text(link: &str) -> String {
    format!(
        "Welcome to Notas!\n\nConfirm your email address by opening the link below.\n\n{link}\n\nThe link expires in 24 hours."
    )
}

fn password_reset_text(link: &str) -> String {
    format!(
        "A password reset was requested for your Notas account.\n\nChoose a new password here:\n\n{link}\n\nThe link expires in 1 hour. If you did not ask for this, ignore this email."
    )
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send_verification(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        let link = verification_link(&self.base_url, token);
        self.send(to, "Verify your email", verification_text(&link)).await
    }

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        let link = password_reset_link(&self.base_url, token);
        self.send(to, "Reset your password", password_reset_text(&link)).await
    }
}
