//! Stripe objects as they arrive in webhook payloads and API responses,
//! and their translation into [`GatewayEvent`]s.
//!
//! Only the fields the subscription core reads are modelled; everything
//! else in the JSON is ignored.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Correlation, GatewayEvent, GatewayEventKind, WebhookError};

/// Metadata keys written on checkout and read back from events.
pub const SUBSCRIBER_ID_KEY: &str = "subscriber_id";
pub const CREATOR_ID_KEY: &str = "creator_id";
pub const SUBSCRIPTION_ID_KEY: &str = "subscription_id";

// ════════════════════════════════════════════════════════════════════════════════
// Signature Header
// ════════════════════════════════════════════════════════════════════════════════

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// Stripe sends several `v1` entries while a signing secret is being
/// rolled; any one of them matching is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        if header.trim().is_empty() {
            return Err(WebhookError::MissingSignature);
        }

        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError(format!("malformed element '{}'", part)))?;
            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse::<i64>().map_err(|_| {
                        WebhookError::ParseError("signature timestamp is not a number".to_string())
                    })?);
                }
                "v1" => {
                    let bytes = hex::decode(value.trim()).map_err(|_| {
                        WebhookError::ParseError("v1 signature is not valid hex".to_string())
                    })?;
                    v1_signatures.push(bytes);
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookError::ParseError("signature header has no timestamp".to_string())
        })?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError(
                "signature header has no v1 signature".to_string(),
            ));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StripeWebhookEvent {
    /// evt_...
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix seconds.
    pub created: i64,
    pub data: StripeEventData,
    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// API Objects
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// cs_...
    pub id: String,
    /// Hosted checkout page. Absent once the session is complete.
    pub url: Option<String>,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// sub_...
    pub id: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// in_...
    pub id: String,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub subscription_details: Option<StripeSubscriptionDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub lines: StripeInvoiceLines,
}

/// Snapshot of the subscription's metadata at invoice time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSubscriptionDetails {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeInvoiceLines {
    #[serde(default)]
    pub data: Vec<StripeInvoiceLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLine {
    pub period: StripeInvoicePeriod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoicePeriod {
    pub start: i64,
    pub end: i64,
}

impl StripeInvoice {
    /// Correlation metadata, preferring the subscription's own over the invoice's.
    fn metadata(&self) -> &HashMap<String, String> {
        match &self.subscription_details {
            Some(details) if !details.metadata.is_empty() => &details.metadata,
            _ => &self.metadata,
        }
    }

    /// Latest period end among the invoice lines.
    fn period_end(&self) -> Option<i64> {
        self.lines.data.iter().map(|line| line.period.end).max()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Translation
// ════════════════════════════════════════════════════════════════════════════════

impl StripeWebhookEvent {
    /// Maps the event onto the subscription lifecycle.
    ///
    /// Returns `Ok(None)` for event types, and invoices, that do not
    /// concern a subscription.
    pub fn to_gateway_event(&self) -> Result<Option<GatewayEvent>, WebhookError> {
        let occurred_at = unix(self.created, "created")?;

        // `invoice.payment_succeeded` is sent alongside `invoice.paid` for the
        // same invoice under a different event id. Only `invoice.paid` is booked.
        match self.event_type.as_str() {
            "invoice.paid" | "invoice.payment_failed" => {
                let invoice: StripeInvoice = self.object()?;
                let Some(external_subscription_id) = invoice.subscription.clone() else {
                    tracing::debug!(invoice_id = %invoice.id, "Invoice without subscription ignored");
                    return Ok(None);
                };
                let (kind, amount) = if self.event_type == "invoice.payment_failed" {
                    (GatewayEventKind::PaymentFailed, invoice.amount_due)
                } else {
                    (GatewayEventKind::PaymentSucceeded, invoice.amount_paid)
                };
                Ok(Some(GatewayEvent {
                    external_event_id: self.id.clone(),
                    kind,
                    external_subscription_id,
                    correlation: correlation(invoice.metadata()),
                    amount_cents: Some(amount),
                    occurred_at,
                    period_end: invoice
                        .period_end()
                        .map(|end| unix(end, "lines.period.end"))
                        .transpose()?,
                }))
            }
            "customer.subscription.deleted" => {
                let subscription: StripeSubscription = self.object()?;
                let period_end = subscription
                    .ended_at
                    .or(subscription.current_period_end)
                    .map(|end| unix(end, "ended_at"))
                    .transpose()?;
                Ok(Some(GatewayEvent {
                    external_event_id: self.id.clone(),
                    kind: GatewayEventKind::SubscriptionCanceled,
                    external_subscription_id: subscription.id,
                    correlation: correlation(&subscription.metadata),
                    amount_cents: None,
                    occurred_at,
                    period_end,
                }))
            }
            _ => Ok(None),
        }
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            WebhookError::ParseError(format!("{} object: {}", self.event_type, e))
        })
    }
}

fn unix(secs: i64, field: &'static str) -> Result<Timestamp, WebhookError> {
    Timestamp::from_unix_secs(secs).ok_or(WebhookError::MissingField(field))
}

/// Reads the checkout correlation. Unparseable ids count as absent.
fn correlation(metadata: &HashMap<String, String>) -> Correlation {
    let user = |key: &str| metadata.get(key).and_then(|v| v.parse::<UserId>().ok());
    Correlation {
        subscriber_id: user(SUBSCRIBER_ID_KEY),
        creator_id: user(CREATOR_ID_KEY),
        subscription_id: metadata
            .get(SUBSCRIPTION_ID_KEY)
            .and_then(|v| v.parse::<SubscriptionId>().ok()),
    }
}
