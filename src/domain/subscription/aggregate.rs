//! Subscription aggregate.
//!
//! # Invariants
//!
//! - At most one subscription per (subscriber, creator) pair is Pending or
//!   Active. The aggregate cannot see its siblings, so the repository
//!   enforces this one.
//! - `external_subscription_id` is bound no later than the first transition
//!   to Active, and never rebound to a different value.
//! - `end_date` only moves forward.
//! - `version` is owned by the repository and bumped on every committed write.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};

use super::{GatewayEvent, SubscriptionStatus};

/// What a successful payment did to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// First payment: Pending became Active.
    Activated,
    /// Renewal of an already active subscription.
    Renewed,
    /// Late payment on a canceled subscription. Ledger only.
    Recorded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber_id: UserId,
    pub creator_id: UserId,
    pub status: SubscriptionStatus,
    /// Gateway subscription id, empty until the first payment event.
    pub external_subscription_id: Option<String>,
    pub start_date: Option<Timestamp>,
    /// Paid-through date. `None` while waiting for the first payment.
    pub end_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

impl Subscription {
    /// Opens a Pending subscription for a checkout that was just started.
    pub fn open_checkout(subscriber_id: UserId, creator_id: UserId) -> Result<Self, DomainError> {
        if subscriber_id == creator_id {
            return Err(DomainError::validation(
                "creator_id",
                "Cannot subscribe to yourself",
            ));
        }
        let now = Timestamp::now();
        Ok(Self {
            id: SubscriptionId::new(),
            subscriber_id,
            creator_id,
            status: SubscriptionStatus::Pending,
            external_subscription_id: None,
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// A Pending row whose checkout session can no longer complete.
    pub fn is_abandoned_checkout(&self, now: Timestamp, expiry_hours: i64) -> bool {
        self.status == SubscriptionStatus::Pending
            && self.external_subscription_id.is_none()
            && self.created_at.is_before(&now.minus_hours(expiry_hours))
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.subscriber_id == user_id
    }

    /// Applies a successful payment: binds the gateway id, activates a
    /// Pending subscription and pushes the paid-through date forward.
    pub fn apply_payment_succeeded(
        &mut self,
        event: &GatewayEvent,
    ) -> Result<PaymentOutcome, DomainError> {
        self.bind_external_id(&event.external_subscription_id)?;
        let outcome = match self.status {
            SubscriptionStatus::Pending => {
                self.transition_to(SubscriptionStatus::Active)?;
                self.start_date = Some(event.occurred_at);
                PaymentOutcome::Activated
            }
            SubscriptionStatus::Active => PaymentOutcome::Renewed,
            SubscriptionStatus::Canceled => PaymentOutcome::Recorded,
        };
        self.extend_end_date(event.period_end_or_default());
        self.touch();
        Ok(outcome)
    }

    /// A failed payment leaves the status alone; only the binding may change.
    pub fn apply_payment_failed(&mut self, event: &GatewayEvent) -> Result<(), DomainError> {
        self.bind_external_id(&event.external_subscription_id)?;
        self.touch();
        Ok(())
    }

    /// Applies a gateway-originated cancellation.
    ///
    /// Returns `true` when this call performed the transition, `false` when
    /// the subscription was already canceled.
    pub fn apply_gateway_cancellation(&mut self, event: &GatewayEvent) -> Result<bool, DomainError> {
        self.bind_external_id(&event.external_subscription_id)?;
        let newly_canceled = self.status != SubscriptionStatus::Canceled;
        if newly_canceled {
            self.transition_to(SubscriptionStatus::Canceled)?;
        }
        let end = event.period_end.unwrap_or(event.occurred_at);
        self.extend_end_date(end);
        self.touch();
        Ok(newly_canceled)
    }

    /// Cancellation requested by the subscriber after the gateway confirmed it.
    pub fn cancel_by_subscriber(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Only active subscriptions can be canceled, status is {}", self.status),
            )
            .with_detail("status", self.status.as_str()));
        }
        self.transition_to(SubscriptionStatus::Canceled)?;
        self.extend_end_date(now);
        self.touch();
        Ok(())
    }

    fn bind_external_id(&mut self, external_id: &str) -> Result<(), DomainError> {
        match &self.external_subscription_id {
            Some(existing) if existing == external_id => Ok(()),
            Some(existing) => Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Subscription {} is bound to {}, refusing {}",
                    self.id, existing, external_id
                ),
            )),
            None if external_id.is_empty() => Err(DomainError::validation(
                "external_subscription_id",
                "Gateway subscription id is empty",
            )),
            None => {
                self.external_subscription_id = Some(external_id.to_string());
                Ok(())
            }
        }
    }

    fn extend_end_date(&mut self, candidate: Timestamp) {
        self.end_date = Some(match self.end_date {
            Some(current) => current.latest(candidate),
            None => candidate,
        });
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self
            .status
            .advance_to(target)
            .map_err(|e| e.with_detail("subscription_id", self.id.to_string()))?;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{Correlation, GatewayEventKind};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    fn pending() -> Subscription {
        Subscription::open_checkout(UserId::new(), UserId::new()).unwrap()
    }

    fn event(kind: GatewayEventKind, occurred: i64, period_end: Option<i64>) -> GatewayEvent {
        GatewayEvent {
            external_event_id: format!("evt_{}", occurred),
            kind,
            external_subscription_id: "sub_123".to_string(),
            correlation: Correlation::default(),
            amount_cents: Some(700),
            occurred_at: ts(occurred),
            period_end: period_end.map(ts),
        }
    }

    #[test]
    fn open_checkout_starts_pending_without_binding() {
        let sub = pending();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert!(sub.external_subscription_id.is_none());
        assert!(sub.end_date.is_none());
        assert_eq!(sub.version, 0);
    }

    #[test]
    fn open_checkout_rejects_self_subscription() {
        let user = UserId::new();
        let err = Subscription::open_checkout(user, user).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn first_payment_activates_and_binds() {
        let mut sub = pending();
        let outcome = sub
            .apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, Some(5_000)))
            .unwrap();

        assert_eq!(outcome, PaymentOutcome::Activated);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.external_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(sub.start_date, Some(ts(1_000)));
        assert_eq!(sub.end_date, Some(ts(5_000)));
    }

    #[test]
    fn renewal_keeps_start_date_and_extends_end() {
        let mut sub = pending();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, Some(5_000)))
            .unwrap();
        let outcome = sub
            .apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 5_000, Some(9_000)))
            .unwrap();

        assert_eq!(outcome, PaymentOutcome::Renewed);
        assert_eq!(sub.start_date, Some(ts(1_000)));
        assert_eq!(sub.end_date, Some(ts(9_000)));
    }

    #[test]
    fn out_of_order_renewal_never_moves_end_back() {
        let mut sub = pending();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 5_000, Some(9_000)))
            .unwrap();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, Some(5_000)))
            .unwrap();

        assert_eq!(sub.end_date, Some(ts(9_000)));
    }

    #[test]
    fn failed_payment_leaves_status_unchanged() {
        let mut sub = pending();
        sub.apply_payment_failed(&event(GatewayEventKind::PaymentFailed, 1_000, None))
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.external_subscription_id.as_deref(), Some("sub_123"));
    }

    #[test]
    fn payment_for_different_external_id_is_rejected() {
        let mut sub = pending();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, None))
            .unwrap();
        let mut other = event(GatewayEventKind::PaymentSucceeded, 2_000, None);
        other.external_subscription_id = "sub_other".to_string();

        let err = sub.apply_payment_succeeded(&other).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn gateway_cancellation_keeps_later_paid_end() {
        let mut sub = pending();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, Some(9_000)))
            .unwrap();
        let newly = sub
            .apply_gateway_cancellation(&event(GatewayEventKind::SubscriptionCanceled, 2_000, Some(3_000)))
            .unwrap();

        assert!(newly);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.end_date, Some(ts(9_000)));
    }

    #[test]
    fn repeated_gateway_cancellation_is_a_no_op() {
        let mut sub = pending();
        let cancel = event(GatewayEventKind::SubscriptionCanceled, 2_000, Some(3_000));
        assert!(sub.apply_gateway_cancellation(&cancel).unwrap());
        assert!(!sub.apply_gateway_cancellation(&cancel).unwrap());
        assert_eq!(sub.end_date, Some(ts(3_000)));
    }

    #[test]
    fn late_payment_on_canceled_subscription_only_extends() {
        let mut sub = pending();
        sub.apply_gateway_cancellation(&event(GatewayEventKind::SubscriptionCanceled, 1_000, None))
            .unwrap();
        let outcome = sub
            .apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_500, Some(4_000)))
            .unwrap();

        assert_eq!(outcome, PaymentOutcome::Recorded);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.end_date, Some(ts(4_000)));
    }

    #[test]
    fn subscriber_cancel_requires_active() {
        let mut sub = pending();
        let err = sub.cancel_by_subscriber(Timestamp::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sub.status, SubscriptionStatus::Pending);
    }

    #[test]
    fn subscriber_cancel_keeps_paid_through_date() {
        let mut sub = pending();
        sub.apply_payment_succeeded(&event(GatewayEventKind::PaymentSucceeded, 1_000, Some(9_000)))
            .unwrap();
        sub.cancel_by_subscriber(ts(2_000)).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.end_date, Some(ts(9_000)));
    }

    #[test]
    fn abandoned_checkout_detection() {
        let mut sub = pending();
        sub.created_at = Timestamp::now().minus_hours(48);
        assert!(sub.is_abandoned_checkout(Timestamp::now(), 24));
        assert!(!sub.is_abandoned_checkout(Timestamp::now(), 72));

        sub.external_subscription_id = Some("sub_1".to_string());
        assert!(!sub.is_abandoned_checkout(Timestamp::now(), 24));
    }
}
