//! Configuration failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Sources could not be read or did not deserialize.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded value that the service cannot run with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingRequired(&'static str),

    // Server
    #[error("Cannot bind to host {0}")]
    InvalidHost(String),

    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("Request timeout must be between 1 and 300 seconds")]
    InvalidTimeout,

    // Database
    #[error("Database URL is not a postgres connection string")]
    InvalidDatabaseUrl,

    #[error("Pool needs a non-zero max_connections at least min_connections")]
    InvalidPoolSize,

    #[error("Pool max_connections above 100")]
    PoolSizeTooLarge,

    // Payment
    #[error("Stripe API key must be a secret (sk_) or restricted (rk_) key")]
    InvalidStripeKey,

    #[error("Stripe webhook secret must start with whsec_")]
    InvalidStripeWebhookSecret,

    #[error("Checkout {0} must be an absolute http(s) URL")]
    InvalidRedirectUrl(&'static str),

    #[error("Gateway timeout must be between 1 and 60 seconds")]
    InvalidGatewayTimeout,

    #[error("Checkout expiry must be at least one hour")]
    InvalidCheckoutExpiry,

    #[error("Production requires a live Stripe key")]
    LiveKeyRequired,

    // Email
    #[error("Resend API key must start with re_")]
    InvalidResendKey,

    #[error("Sender address is not an email address")]
    InvalidFromEmail,
}
