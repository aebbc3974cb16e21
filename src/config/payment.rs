//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    /// Recurring price charged for a creator subscription
    pub price_id: String,

    /// Where the gateway sends the subscriber after paying
    pub success_url: String,

    /// Where the gateway sends the subscriber after backing out
    pub cancel_url: String,

    /// Upper bound on any single gateway call, in seconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Maximum age of a webhook signature, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    /// Hours before an unpaid checkout stops blocking a new one
    #[serde(default = "default_checkout_expiry")]
    pub checkout_expiry_hours: i64,

    /// Reject webhook events created in test mode
    #[serde(default)]
    pub require_livemode: bool,

    /// Override of the Stripe API base URL
    pub api_base_url: Option<String>,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"));
        }
        if self.price_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PRICE_ID"));
        }

        // Secret and restricted keys only; publishable keys cannot create sessions
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !is_http_url(&self.success_url) {
            return Err(ValidationError::InvalidRedirectUrl("success_url"));
        }
        if !is_http_url(&self.cancel_url) {
            return Err(ValidationError::InvalidRedirectUrl("cancel_url"));
        }
        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 60 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        if self.checkout_expiry_hours < 1 {
            return Err(ValidationError::InvalidCheckoutExpiry);
        }
        if *environment == Environment::Production && self.is_test_mode() {
            return Err(ValidationError::LiveKeyRequired);
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_checkout_expiry() -> i64 {
    24
}
