//! Stripe payment gateway adapter.
//!
//! - [`StripePaymentGateway`]: customers, checkout sessions, cancellation
//! - [`StripeWebhookDecoder`]: signature verification and event translation
//! - [`MockPaymentGateway`]: scriptable stand-in for tests
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Signature timestamps older than five minutes are rejected
//! - All secrets are handled via `secrecy::SecretString`

mod mock_payment_gateway;
mod stripe_adapter;
mod webhook_decoder;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_adapter::{StripeConfig, StripePaymentGateway};
pub use webhook_decoder::{StripeWebhookDecoder, DEFAULT_TOLERANCE_SECS};
pub use webhook_types::{SignatureHeader, StripeWebhookEvent};

#[cfg(test)]
pub(crate) use webhook_decoder::sign_for_test;
