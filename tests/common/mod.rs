//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use creator_subscriptions::adapters::memory::InMemoryStore;
use creator_subscriptions::adapters::notification::LoggingNotifier;
use creator_subscriptions::adapters::stripe::MockPaymentGateway;
use creator_subscriptions::application::handlers::subscription::{
    CancelSubscriptionHandler, CheckoutSettings, ReconcileGatewayEventHandler,
    StartCheckoutHandler,
};
use creator_subscriptions::domain::foundation::{SubscriptionId, Timestamp, UserId};
use creator_subscriptions::domain::subscription::{Correlation, GatewayEvent, GatewayEventKind};
use creator_subscriptions::domain::user::{UserAccount, UserRole};

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        price_ref: "price_creator_monthly".to_string(),
        success_url: "https://app.example.com/subscribe/success".to_string(),
        cancel_url: "https://app.example.com/subscribe/cancel".to_string(),
        gateway_timeout: Duration::from_secs(2),
        checkout_expiry_hours: 24,
    }
}

pub fn account(role: UserRole, name: &str) -> UserAccount {
    UserAccount {
        id: UserId::new(),
        user_name: name.to_string(),
        email: format!("{}@example.com", name),
        role,
        gateway_customer_id: None,
    }
}

/// In-memory store, scriptable gateway and one subscriber/creator pair.
pub struct World {
    pub store: InMemoryStore,
    pub gateway: MockPaymentGateway,
    pub subscriber: UserAccount,
    pub creator: UserAccount,
}

impl World {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let subscriber = account(UserRole::User, "sam");
        let creator = account(UserRole::ContentCreator, "cleo");
        store.insert_user(subscriber.clone()).unwrap();
        store.insert_user(creator.clone()).unwrap();
        Self {
            store,
            gateway: MockPaymentGateway::new(),
            subscriber,
            creator,
        }
    }

    pub fn checkout(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.store.clone()),
            Arc::new(self.gateway.clone()),
            settings(),
        )
    }

    pub fn cancel(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.gateway.clone()),
            Arc::new(self.store.clone()),
            Arc::new(LoggingNotifier),
            settings().gateway_timeout,
        )
    }

    pub fn reconciler(&self) -> ReconcileGatewayEventHandler {
        ReconcileGatewayEventHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.store.clone()),
            Arc::new(LoggingNotifier),
        )
    }

    pub fn correlation(&self) -> Correlation {
        Correlation::new(self.subscriber.id, self.creator.id)
    }

    /// Correlation as echoed back by the checkout opened for `id`.
    pub fn correlation_for(&self, id: SubscriptionId) -> Correlation {
        self.correlation().for_subscription(id)
    }
}

/// External subscription id the gateway assigns to a local subscription.
pub fn external_id(id: SubscriptionId) -> String {
    format!("sub_{}", id.as_uuid().simple())
}

pub fn payment(
    event_id: &str,
    external_subscription_id: &str,
    correlation: Correlation,
    amount_cents: i64,
    occurred_at: Timestamp,
) -> GatewayEvent {
    GatewayEvent {
        external_event_id: event_id.to_string(),
        kind: GatewayEventKind::PaymentSucceeded,
        external_subscription_id: external_subscription_id.to_string(),
        correlation,
        amount_cents: Some(amount_cents),
        occurred_at,
        period_end: Some(occurred_at.plus_days(30)),
    }
}

pub fn failed_payment(
    event_id: &str,
    external_subscription_id: &str,
    amount_cents: i64,
    occurred_at: Timestamp,
) -> GatewayEvent {
    GatewayEvent {
        kind: GatewayEventKind::PaymentFailed,
        period_end: None,
        ..payment(
            event_id,
            external_subscription_id,
            Correlation::default(),
            amount_cents,
            occurred_at,
        )
    }
}

pub fn gateway_cancel(
    event_id: &str,
    external_subscription_id: &str,
    occurred_at: Timestamp,
    period_end: Option<Timestamp>,
) -> GatewayEvent {
    GatewayEvent {
        external_event_id: event_id.to_string(),
        kind: GatewayEventKind::SubscriptionCanceled,
        external_subscription_id: external_subscription_id.to_string(),
        correlation: Correlation::default(),
        amount_cents: None,
        occurred_at,
        period_end,
    }
}
