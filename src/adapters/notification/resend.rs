//! Resend implementation of `SubscriptionNotifier`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SubscriptionNotification, SubscriptionNotifier};

use super::templates::render;

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: SecretString,
    /// `Name <address>` used as sender.
    pub from: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: SecretString, from: impl Into<String>) -> Self {
        Self {
            api_key,
            from: from.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

pub struct ResendEmailNotifier {
    config: ResendConfig,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl ResendEmailNotifier {
    pub fn new(config: ResendConfig) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl SubscriptionNotifier for ResendEmailNotifier {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<(), DomainError> {
        let email = render(&notification);
        let body = SendEmailRequest {
            from: &self.config.from,
            to: [&notification.recipient_email],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .http_client
            .post(format!("{}/emails", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::InternalError, format!("Email request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Resend returned {}: {}", status, text),
            ));
        }

        tracing::debug!(kind = ?notification.kind, "Notification email sent");
        Ok(())
    }
}
