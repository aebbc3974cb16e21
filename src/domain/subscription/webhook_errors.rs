//! Reasons a webhook delivery is refused before reconciliation.
//!
//! All of these are final for the given bytes: the gateway resending the
//! same payload and header cannot succeed, so they map to a 4xx.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("No signature header on webhook request")]
    MissingSignature,

    /// HMAC mismatch, or an event from the wrong mode (test vs live).
    #[error("Webhook signature does not verify")]
    InvalidSignature,

    /// Signed too long ago; possibly a replayed capture.
    #[error("Webhook signature is older than the tolerance window")]
    TimestampOutOfRange,

    /// Signed further in the future than clock skew explains.
    #[error("Webhook signature timestamp is in the future")]
    InvalidTimestamp,

    #[error("Malformed webhook: {0}")]
    ParseError(String),

    /// A recognized event lacks a field reconciliation needs.
    #[error("Webhook event lacks {0}")]
    MissingField(&'static str),
}
