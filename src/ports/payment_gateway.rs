//! Payment gateway port.
//!
//! The capabilities the subscription core needs from an external
//! payment processor. Lifecycle events flow the other way, through the
//! webhook endpoint and [`WebhookDecoder`](super::WebhookDecoder).
//!
//! Implementations must bound every call in time; callers add their own
//! timeout on top.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the gateway customer id for a user.
    ///
    /// Reuses `existing_customer_id` when the gateway still knows it,
    /// otherwise creates a new customer.
    async fn get_or_create_customer(&self, request: CustomerRequest)
        -> Result<String, GatewayError>;

    /// Creates a hosted checkout session for a recurring price.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Closes an unpaid checkout session so it can no longer be completed.
    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError>;

    /// Cancels a subscription at the gateway immediately, without proration.
    async fn cancel_remote_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRequest {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub existing_customer_id: Option<String>,
}

/// Data attached to a checkout session so later events can be matched back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutCorrelation {
    pub subscription_id: SubscriptionId,
    pub subscriber_id: UserId,
    pub creator_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub price_ref: String,
    pub success_url: String,
    pub cancel_url: String,
    pub correlation: CheckoutCorrelation,
}

/// Opaque handle returned to the client for the redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
    pub expires_at: Option<Timestamp>,
}

/// Gateway failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    /// Provider's own error code, if it sent one.
    pub provider_code: Option<String>,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            GatewayErrorCode::Timeout,
            format!("{} did not complete in time", operation),
        )
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    NetworkError,
    Timeout,
    AuthenticationError,
    InvalidRequest,
    NotFound,
    RateLimitExceeded,
    ProviderError,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
