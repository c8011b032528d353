use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Out-of-band quota notifications. Sent at most once per 24h window;
/// failures are logged and swallowed, never surfaced to the caller.
#[async_trait]
pub trait LimitNotifier: Send + Sync {
    async fn send_limit_exceeded(
        &self,
        email: &str,
        tier: &str,
        used: i64,
        limit: i64,
        renewal: DateTime<Utc>,
    ) -> Result<(), String>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl LimitNotifier for SmtpNotifier {
    async fn send_limit_exceeded(
        &self,
        email: &str,
        tier: &str,
        used: i64,
        limit: i64,
        renewal: DateTime<Utc>,
    ) -> Result<(), String> {
        let html = format!(
            "<p>Your mock API has used {used} of {limit} requests allowed on the \
             <strong>{tier}</strong> plan.</p>\
             <p>Requests will be served again after {}.</p>\
             <p>Upgrade your plan to raise the limit.</p>",
            renewal.to_rfc3339()
        );

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(email.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject("Request limit reached - Mockwire")
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

/// Used when no SMTP block is configured.
pub struct NoopNotifier;

#[async_trait]
impl LimitNotifier for NoopNotifier {
    async fn send_limit_exceeded(
        &self,
        email: &str,
        tier: &str,
        used: i64,
        limit: i64,
        _renewal: DateTime<Utc>,
    ) -> Result<(), String> {
        tracing::debug!("Limit notification suppressed (no SMTP): {email} {tier} {used}/{limit}");
        Ok(())
    }
}
