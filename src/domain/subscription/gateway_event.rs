//! Normalized payment gateway lifecycle events.
//!
//! Adapters translate provider-specific webhook payloads into
//! [`GatewayEvent`] so reconciliation never sees provider JSON.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};

/// Billing period assumed when a payment event carries no period end.
pub const DEFAULT_BILLING_PERIOD_DAYS: i64 = 30;

/// Lifecycle event types the reconciler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionCanceled,
}

impl GatewayEventKind {
    /// Payment events append a ledger row and are gated on the event id.
    pub fn is_payment(&self) -> bool {
        matches!(
            self,
            GatewayEventKind::PaymentSucceeded | GatewayEventKind::PaymentFailed
        )
    }
}

/// Ids attached to the checkout session and echoed back on its events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub subscriber_id: Option<UserId>,
    pub creator_id: Option<UserId>,
    /// Local row the checkout was opened for.
    pub subscription_id: Option<SubscriptionId>,
}

impl Correlation {
    pub fn new(subscriber_id: UserId, creator_id: UserId) -> Self {
        Self {
            subscriber_id: Some(subscriber_id),
            creator_id: Some(creator_id),
            subscription_id: None,
        }
    }

    pub fn for_subscription(mut self, subscription_id: SubscriptionId) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    /// Whether a Pending row may be bound to the event's gateway subscription.
    ///
    /// A checkout tagged with a row id only binds that row; untagged
    /// events fall back to the pair alone.
    pub fn may_bind(&self, pending: SubscriptionId) -> bool {
        self.subscription_id.map_or(true, |id| id == pending)
    }

    /// Both halves of the pair, when the gateway echoed them back.
    pub fn pair(&self) -> Option<(UserId, UserId)> {
        match (self.subscriber_id, self.creator_id) {
            (Some(subscriber), Some(creator)) => Some((subscriber, creator)),
            _ => None,
        }
    }
}

/// One gateway lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Gateway event id, the idempotency key for payment events.
    pub external_event_id: String,
    pub kind: GatewayEventKind,
    pub external_subscription_id: String,
    pub correlation: Correlation,
    /// Minor currency units. Required for payment events.
    pub amount_cents: Option<i64>,
    pub occurred_at: Timestamp,
    /// End of the billing period the event refers to, when known.
    pub period_end: Option<Timestamp>,
}

impl GatewayEvent {
    /// Period end, defaulting to one billing period after the event.
    pub fn period_end_or_default(&self) -> Timestamp {
        self.period_end
            .unwrap_or_else(|| self.occurred_at.plus_days(DEFAULT_BILLING_PERIOD_DAYS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(period_end: Option<Timestamp>) -> GatewayEvent {
        GatewayEvent {
            external_event_id: "evt_1".to_string(),
            kind: GatewayEventKind::PaymentSucceeded,
            external_subscription_id: "sub_1".to_string(),
            correlation: Correlation::default(),
            amount_cents: Some(700),
            occurred_at: Timestamp::from_unix_secs(1_704_067_200).unwrap(),
            period_end,
        }
    }

    #[test]
    fn period_end_defaults_to_thirty_days() {
        let e = event(None);
        assert_eq!(e.period_end_or_default(), e.occurred_at.plus_days(30));
    }

    #[test]
    fn explicit_period_end_wins() {
        let end = Timestamp::from_unix_secs(1_706_745_600).unwrap();
        assert_eq!(event(Some(end)).period_end_or_default(), end);
    }

    #[test]
    fn pair_requires_both_sides() {
        let subscriber = UserId::new();
        let creator = UserId::new();
        assert_eq!(
            Correlation::new(subscriber, creator).pair(),
            Some((subscriber, creator))
        );
        let half = Correlation {
            subscriber_id: Some(subscriber),
            creator_id: None,
            subscription_id: None,
        };
        assert_eq!(half.pair(), None);
    }

    #[test]
    fn tagged_correlation_binds_only_its_own_row() {
        let row = SubscriptionId::new();
        let tagged = Correlation::new(UserId::new(), UserId::new()).for_subscription(row);

        assert!(tagged.may_bind(row));
        assert!(!tagged.may_bind(SubscriptionId::new()));
        assert!(Correlation::default().may_bind(row));
    }

    #[test]
    fn only_payment_kinds_are_payments() {
        assert!(GatewayEventKind::PaymentSucceeded.is_payment());
        assert!(GatewayEventKind::PaymentFailed.is_payment());
        assert!(!GatewayEventKind::SubscriptionCanceled.is_payment());
    }
}
