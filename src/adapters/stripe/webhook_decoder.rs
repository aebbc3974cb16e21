//! Stripe webhook verification and decoding.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{t}.{payload}"` with constant-time comparison
//! - Signatures older than the tolerance window are rejected
//! - Secrets stay in `secrecy::SecretString`

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{GatewayEvent, WebhookError};
use crate::ports::WebhookDecoder;

use super::webhook_types::{SignatureHeader, StripeWebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Default maximum signature age.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for timestamps in the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

pub struct StripeWebhookDecoder {
    secret: SecretString,
    tolerance_secs: i64,
    require_livemode: bool,
}

impl StripeWebhookDecoder {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            require_livemode: false,
        }
    }

    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Reject test-mode events.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    fn verify(&self, payload: &[u8], header: &SignatureHeader, now: i64) -> Result<(), WebhookError> {
        let age = now - header.timestamp;
        if age > self.tolerance_secs {
            tracing::warn!(
                signed_at = header.timestamp,
                age_secs = age,
                "Webhook signature too old, possible replay"
            );
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_FUTURE_SKEW_SECS {
            tracing::warn!(signed_at = header.timestamp, now, "Webhook signed in the future");
            return Err(WebhookError::InvalidTimestamp);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }
}

impl WebhookDecoder for StripeWebhookDecoder {
    fn decode(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<GatewayEvent>, WebhookError> {
        let header = SignatureHeader::parse(signature.ok_or(WebhookError::MissingSignature)?)?;
        self.verify(payload, &header, Timestamp::now().as_unix_secs())?;

        let event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;

        if self.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Test mode event rejected");
            return Err(WebhookError::InvalidSignature);
        }

        let decoded = event.to_gateway_event()?;
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            handled = decoded.is_some(),
            "Webhook signature verified"
        );
        Ok(decoded)
    }
}

/// Builds a valid `Stripe-Signature` header for `payload`.
#[cfg(test)]
pub(crate) fn sign_for_test(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
