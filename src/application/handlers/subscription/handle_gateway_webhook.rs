//! HandleGatewayWebhookHandler - Verifies, decodes and reconciles a webhook delivery.
//!
//! The outcome decides what the gateway sees: every `WebhookOutcome` is
//! acknowledged, a `Rejected` failure is a client error the gateway should
//! not retry, and a `Failed` one is retried by the gateway later.

use std::sync::Arc;

use crate::domain::subscription::{SubscriptionError, WebhookError};
use crate::ports::WebhookDecoder;

use super::reconcile_gateway_event::{ReconcileGatewayEventHandler, ReconcileOutcome};

/// Acknowledged webhook deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// Replay of an event that was already applied.
    AlreadyApplied,
    /// Authentic event of a type the subscription core does not act on.
    Ignored,
    /// No local subscription matches. Acknowledged so the gateway stops retrying.
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookFailure {
    /// Signature or payload problem.
    Rejected(WebhookError),
    /// Reconciliation failed.
    Failed(SubscriptionError),
}

impl WebhookFailure {
    /// Whether the gateway should deliver the event again.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookFailure::Rejected(_) => false,
            WebhookFailure::Failed(err) => err.is_retryable(),
        }
    }
}

impl std::fmt::Display for WebhookFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookFailure::Rejected(err) => write!(f, "webhook rejected: {}", err),
            WebhookFailure::Failed(err) => write!(f, "webhook processing failed: {}", err),
        }
    }
}

pub struct HandleGatewayWebhookHandler {
    decoder: Arc<dyn WebhookDecoder>,
    reconciler: Arc<ReconcileGatewayEventHandler>,
}

impl HandleGatewayWebhookHandler {
    pub fn new(
        decoder: Arc<dyn WebhookDecoder>,
        reconciler: Arc<ReconcileGatewayEventHandler>,
    ) -> Self {
        Self {
            decoder,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookFailure> {
        let event = match self.decoder.decode(payload, signature) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(WebhookOutcome::Ignored),
            Err(err) => {
                tracing::warn!(error = %err, payload_bytes = payload.len(), "Webhook rejected");
                return Err(WebhookFailure::Rejected(err));
            }
        };

        let external_event_id = event.external_event_id.clone();
        match self.reconciler.handle(event).await {
            Ok(ReconcileOutcome::Applied { .. }) => Ok(WebhookOutcome::Applied),
            Ok(ReconcileOutcome::AlreadyApplied) => Ok(WebhookOutcome::AlreadyApplied),
            Err(SubscriptionError::OrphanEvent { .. }) => Ok(WebhookOutcome::Orphaned),
            Err(err) => {
                tracing::error!(
                    external_event_id = %external_event_id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Webhook event could not be reconciled"
                );
                Err(WebhookFailure::Failed(err))
            }
        }
    }
}
