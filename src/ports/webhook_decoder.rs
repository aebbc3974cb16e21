//! Webhook decoder port.
//!
//! Turns a raw, signed gateway payload into a normalized event.

use crate::domain::subscription::{GatewayEvent, WebhookError};

pub trait WebhookDecoder: Send + Sync {
    /// Verifies `signature` over `payload` and decodes it.
    ///
    /// Returns `Ok(None)` for authentic events of types the subscription
    /// core does not act on.
    fn decode(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<GatewayEvent>, WebhookError>;
}
