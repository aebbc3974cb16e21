//! HTTP DTOs for the subscription endpoints.
//!
//! JSON shapes at the boundary between axum and the application layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{
    RevenueReport, StartCheckoutResult, SubscriptionDetail, WebhookOutcome,
};
use crate::domain::foundation::UserId;
use crate::domain::subscription::{
    CreatorRanking, PaymentStatus, RevenueBucketing, RevenuePoint, Subscription,
    SubscriptionPayment, SubscriptionStatus,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StartCheckoutRequest {
    /// The content creator to subscribe to.
    pub creator_id: UserId,
}

/// Query string of the revenue endpoints, days as `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenueRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopCreatorsParams {
    pub limit: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub subscription_id: String,
    pub session_id: String,
    /// Hosted checkout page the client redirects to.
    pub checkout_url: String,
    pub expires_at: Option<String>,
}

impl From<StartCheckoutResult> for CheckoutResponse {
    fn from(result: StartCheckoutResult) -> Self {
        Self {
            subscription_id: result.subscription_id.to_string(),
            session_id: result.session.session_id,
            checkout_url: result.session.redirect_url,
            expires_at: result.session.expires_at.map(|t| t.as_datetime().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub subscriber_id: String,
    pub creator_id: String,
    pub status: SubscriptionStatus,
    pub start_date: Option<String>,
    /// End of the paid period, or of access once canceled.
    pub end_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            subscriber_id: sub.subscriber_id.to_string(),
            creator_id: sub.creator_id.to_string(),
            status: sub.status,
            start_date: sub.start_date.map(|t| t.as_datetime().to_rfc3339()),
            end_date: sub.end_date.map(|t| t.as_datetime().to_rfc3339()),
            created_at: sub.created_at.as_datetime().to_rfc3339(),
            updated_at: sub.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: String,
}

impl From<SubscriptionPayment> for PaymentResponse {
    fn from(payment: SubscriptionPayment) -> Self {
        Self {
            id: payment.id.to_string(),
            amount_cents: payment.amount_cents,
            status: payment.status,
            paid_at: payment.paid_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetailResponse {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub payments: Vec<PaymentResponse>,
}

impl From<SubscriptionDetail> for SubscriptionDetailResponse {
    fn from(detail: SubscriptionDetail) -> Self {
        Self {
            subscription: detail.subscription.into(),
            payments: detail.payments.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bucketing: RevenueBucketing,
    pub total_cents: i64,
    pub series: Vec<RevenuePoint>,
}

impl From<RevenueReport> for RevenueResponse {
    fn from(report: RevenueReport) -> Self {
        Self {
            start_date: report.start_date,
            end_date: report.end_date,
            bucketing: report.bucketing,
            total_cents: report.total_cents,
            series: report.series,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCreatorResponse {
    pub creator_id: String,
    pub creator_name: Option<String>,
    pub active_subscriptions: i64,
}

impl From<CreatorRanking> for TopCreatorResponse {
    fn from(ranking: CreatorRanking) -> Self {
        Self {
            creator_id: ranking.creator_id.to_string(),
            creator_name: ranking.creator_name,
            active_subscriptions: ranking.active_subscriptions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCreatorsResponse {
    pub creators: Vec<TopCreatorResponse>,
}

/// Acknowledgement sent back to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub outcome: &'static str,
}

impl From<WebhookOutcome> for WebhookAckResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        let outcome = match outcome {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::AlreadyApplied => "already_applied",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Orphaned => "orphaned",
        };
        Self {
            received: true,
            outcome,
        }
    }
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SubscriptionId, Timestamp};
    use crate::ports::CheckoutSession;

    #[test]
    fn start_checkout_request_reads_creator_uuid() {
        let creator = UserId::new();
        let json = format!(r#"{{"creator_id":"{}"}}"#, creator);
        let request: StartCheckoutRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.creator_id, creator);
    }

    #[test]
    fn start_checkout_request_rejects_non_uuid() {
        let result = serde_json::from_str::<StartCheckoutRequest>(r#"{"creator_id":"bob"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn checkout_response_exposes_redirect_url() {
        let id = SubscriptionId::new();
        let response = CheckoutResponse::from(StartCheckoutResult {
            subscription_id: id,
            session: CheckoutSession {
                session_id: "cs_1".to_string(),
                redirect_url: "https://checkout.stripe.com/c/cs_1".to_string(),
                expires_at: None,
            },
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["subscription_id"], id.to_string());
        assert_eq!(json["checkout_url"], "https://checkout.stripe.com/c/cs_1");
        assert!(json["expires_at"].is_null());
    }

    #[test]
    fn subscription_detail_flattens_subscription_fields() {
        let sub = Subscription::open_checkout(UserId::new(), UserId::new()).unwrap();
        let response = SubscriptionDetailResponse::from(SubscriptionDetail {
            subscription: sub.clone(),
            payments: vec![],
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], sub.id.to_string());
        assert_eq!(json["status"], "pending");
        assert!(json["payments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn payment_response_uses_snake_case_status() {
        let payment = SubscriptionPayment::record(
            SubscriptionId::new(),
            999,
            PaymentStatus::Succeeded,
            Timestamp::now(),
            "evt_1",
        )
        .unwrap();
        let json = serde_json::to_value(PaymentResponse::from(payment)).unwrap();
        assert_eq!(json["amount_cents"], 999);
        assert_eq!(json["status"], "succeeded");
    }

    #[test]
    fn webhook_ack_names_outcome() {
        let ack = WebhookAckResponse::from(WebhookOutcome::Orphaned);
        assert!(ack.received);
        assert_eq!(ack.outcome, "orphaned");
    }
}
