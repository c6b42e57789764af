//! Outbound email: the sender contract, the development sender and the
//! bounded retry wrapper used around production senders.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use notas_core::EmailAddress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// Worth retrying (provider 5xx, rate limit, network).
    #[error("transient email failure: {0}")]
    Transient(String),

    /// Retrying will not help (bad request, rejected recipient, auth).
    #[error("permanent email failure: {0}")]
    Permanent(String),

    #[error("email delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError>;

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/api/auth/verify?token={token}", base_url.trim_end_matches('/'))
}

pub fn password_reset_link(base_url: &str, token: &str) -> String {
    format!("{}/api/auth/reset-password?token={token}", base_url.trim_end_matches('/'))
}

/// A message as the development sender recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: EmailAddress,
    pub kind: EmailKind,
    pub token: String,
    pub link: String,
}

/// Development sender: logs the link instead of mailing it and keeps an outbox.
#[derive(Debug)]
pub struct ConsoleEmailSender {
    base_url: String,
    outbox: Mutex<Vec<OutboundEmail>>,
}

impl ConsoleEmailSender {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub async fn outbox(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().await.clone()
    }

    /// Most recent token mailed to `to` for `kind`.
    pub async fn last_token(&self, to: &EmailAddress, kind: EmailKind) -> Option<String> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| &m.to == to && m.kind == kind)
            .map(|m| m.token.clone())
    }

    async fn record(&self, to: &EmailAddress, kind: EmailKind, token: &str, link: String) {
        tracing::info!(to = %to, kind = ?kind, link = %link, "email (console sender)");
        self.outbox.lock().await.push(OutboundEmail {
            to: to.clone(),
            kind,
            token: token.to_string(),
            link,
        });
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send_verification(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        let link = verification_link(&self.base_url, token);
        self.record(to, EmailKind::Verification, token, link).await;
        Ok(())
    }

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        let link = password_reset_link(&self.base_url, token);
        self.record(to, EmailKind::PasswordReset, token, link).await;
        Ok(())
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (values below 1 behave as 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-indexed): `base * multiplier^(attempt-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay_ms = (base_ms * self.multiplier.powi(exp)).min(max_ms);
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn send_with_retry<F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<(), EmailError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), EmailError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(()) => return Ok(()),
            Err(err @ (EmailError::Permanent(_) | EmailError::Exhausted { .. })) => {
                tracing::error!(attempt, error = %err, "email delivery failed permanently");
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                tracing::error!(attempts = attempt, error = %err, "email delivery retries exhausted");
                return Err(EmailError::Exhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying email delivery");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Applies a [`RetryPolicy`] around any sender.
#[derive(Debug)]
pub struct RetryingEmailSender<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E> RetryingEmailSender<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: EmailSender> EmailSender for RetryingEmailSender<E> {
    async fn send_verification(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        send_with_retry(&self.policy, || self.inner.send_verification(to, token)).await
    }

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), EmailError> {
        send_with_retry(&self.policy, || self.inner.send_password_reset(to, token)).await
    }
}
