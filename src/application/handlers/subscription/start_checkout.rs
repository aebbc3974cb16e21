//! StartCheckoutHandler - Command handler for starting a paid subscription.
//!
//! Order of operations: validate locally, talk to the gateway, and only
//! then write. A gateway failure leaves no local trace, and a failed
//! local write expires the session it was opened with.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{
    CheckoutCorrelation, CheckoutSession, CheckoutSessionRequest, CustomerRequest, PaymentGateway,
    SubscriptionRepository, UserDirectory,
};

use super::support::call_gateway;

/// Checkout parameters fixed by configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Gateway price reference for the creator subscription.
    pub price_ref: String,
    pub success_url: String,
    pub cancel_url: String,
    pub gateway_timeout: Duration,
    /// Pending rows older than this without a gateway binding are abandoned.
    pub checkout_expiry_hours: i64,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub subscriber_id: UserId,
    pub creator_id: UserId,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutResult {
    pub subscription_id: SubscriptionId,
    pub session: CheckoutSession,
}

pub struct StartCheckoutHandler {
    repository: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl StartCheckoutHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            repository,
            users,
            gateway,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, SubscriptionError> {
        if cmd.subscriber_id == cmd.creator_id {
            return Err(SubscriptionError::validation(
                "creator_id",
                "Cannot subscribe to yourself",
            ));
        }

        // 1. Both users must exist; the target must be a creator
        let creator = self
            .users
            .find_user(&cmd.creator_id)
            .await?
            .ok_or_else(|| SubscriptionError::user_not_found(cmd.creator_id))?;
        if !creator.is_creator() {
            return Err(SubscriptionError::forbidden(
                "Target user is not a content creator",
            ));
        }
        let subscriber = self
            .users
            .find_user(&cmd.subscriber_id)
            .await?
            .ok_or_else(|| SubscriptionError::user_not_found(cmd.subscriber_id))?;

        // 2. One Pending/Active subscription per pair; abandoned checkouts don't count
        let now = Timestamp::now();
        let mut abandoned = false;
        if let Some(existing) = self
            .repository
            .find_active_or_pending_by_pair(&cmd.subscriber_id, &cmd.creator_id)
            .await?
        {
            if existing.is_abandoned_checkout(now, self.settings.checkout_expiry_hours) {
                abandoned = true;
            } else {
                tracing::warn!(
                    subscriber_id = %cmd.subscriber_id,
                    creator_id = %cmd.creator_id,
                    existing_id = %existing.id,
                    status = %existing.status,
                    "Checkout rejected, pair already subscribed"
                );
                return Err(SubscriptionError::conflict(cmd.subscriber_id, cmd.creator_id));
            }
        }

        // 3. Gateway customer and session
        let customer_id = call_gateway(
            self.settings.gateway_timeout,
            "get_or_create_customer",
            self.gateway.get_or_create_customer(CustomerRequest {
                user_id: subscriber.id,
                email: subscriber.email.clone(),
                name: subscriber.user_name.clone(),
                existing_customer_id: subscriber.gateway_customer_id.clone(),
            }),
        )
        .await?;

        let subscription = Subscription::open_checkout(cmd.subscriber_id, cmd.creator_id)?;
        let session = call_gateway(
            self.settings.gateway_timeout,
            "create_checkout_session",
            self.gateway.create_checkout_session(CheckoutSessionRequest {
                customer_id: customer_id.clone(),
                price_ref: self.settings.price_ref.clone(),
                success_url: format!("{}?creator={}", self.settings.success_url, creator.user_name),
                cancel_url: format!("{}?creator={}", self.settings.cancel_url, creator.user_name),
                correlation: CheckoutCorrelation {
                    subscription_id: subscription.id,
                    subscriber_id: cmd.subscriber_id,
                    creator_id: cmd.creator_id,
                },
            }),
        )
        .await?;

        // 4. Local writes. A session whose row never lands must not stay payable.
        if let Err(err) = self.write_pending(&subscription, abandoned, now).await {
            self.discard_session(&session, &subscription).await;
            return Err(err);
        }

        if subscriber.gateway_customer_id.as_deref() != Some(customer_id.as_str()) {
            if let Err(e) = self
                .users
                .save_gateway_customer_id(&subscriber.id, &customer_id)
                .await
            {
                tracing::warn!(user_id = %subscriber.id, error = %e, "Failed to store gateway customer id");
            }
        }

        tracing::info!(
            subscription_id = %subscription.id,
            creator_id = %cmd.creator_id,
            session_id = %session.session_id,
            "Checkout started"
        );

        Ok(StartCheckoutResult {
            subscription_id: subscription.id,
            session,
        })
    }

    async fn write_pending(
        &self,
        subscription: &Subscription,
        abandoned: bool,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        let pair = (subscription.subscriber_id, subscription.creator_id);
        if abandoned {
            let cutoff = now.minus_hours(self.settings.checkout_expiry_hours);
            let purged = self
                .repository
                .purge_abandoned_pending(cutoff, Some(pair))
                .await?;
            tracing::info!(
                subscriber_id = %pair.0,
                creator_id = %pair.1,
                purged,
                "Replaced abandoned checkout"
            );
        }

        self.repository
            .insert_pending(subscription)
            .await
            .map_err(|e| match e.code {
                ErrorCode::DuplicateSubscription => SubscriptionError::conflict(pair.0, pair.1),
                _ => e.into(),
            })
    }

    /// Expires a session whose Pending row was not written. Best effort.
    async fn discard_session(&self, session: &CheckoutSession, subscription: &Subscription) {
        let expired = call_gateway(
            self.settings.gateway_timeout,
            "expire_checkout_session",
            self.gateway.expire_checkout_session(&session.session_id),
        )
        .await;
        match expired {
            Ok(()) => tracing::info!(
                subscription_id = %subscription.id,
                session_id = %session.session_id,
                "Expired checkout session without a local row"
            ),
            Err(e) => tracing::warn!(
                subscription_id = %subscription.id,
                session_id = %session.session_id,
                error = %e,
                "Could not expire checkout session without a local row"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::subscription::{
        Correlation, GatewayEvent, GatewayEventKind, SubscriptionStatus,
    };
    use crate::domain::foundation::DomainError;
    use crate::domain::subscription::SubscriptionPayment;
    use crate::domain::user::{UserAccount, UserRole};
    use crate::ports::{CommitOutcome, GatewayError};
    use async_trait::async_trait;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    /// Store wrapper whose pair lookup misses rows written by a concurrent
    /// checkout, so the conflict only surfaces at insert time.
    struct RacingRepository {
        store: InMemoryStore,
    }

    #[async_trait]
    impl SubscriptionRepository for RacingRepository {
        async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
            self.store.find_by_id(id).await
        }
        async fn find_by_external_id(&self, id: &str) -> Result<Option<Subscription>, DomainError> {
            self.store.find_by_external_id(id).await
        }
        async fn find_active_or_pending_by_pair(
            &self,
            _subscriber_id: &UserId,
            _creator_id: &UserId,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }
        async fn list_for_subscriber(&self, id: &UserId) -> Result<Vec<Subscription>, DomainError> {
            self.store.list_for_subscriber(id).await
        }
        async fn insert_pending(&self, s: &Subscription) -> Result<(), DomainError> {
            self.store.insert_pending(s).await
        }
        async fn update(&self, s: &Subscription) -> Result<CommitOutcome, DomainError> {
            self.store.update(s).await
        }
        async fn payment_exists(&self, id: &str) -> Result<bool, DomainError> {
            self.store.payment_exists(id).await
        }
        async fn insert_payment_if_absent(
            &self,
            s: &Subscription,
            p: &SubscriptionPayment,
        ) -> Result<CommitOutcome, DomainError> {
            self.store.insert_payment_if_absent(s, p).await
        }
        async fn list_payments(
            &self,
            id: &SubscriptionId,
        ) -> Result<Vec<SubscriptionPayment>, DomainError> {
            self.store.list_payments(id).await
        }
        async fn purge_abandoned_pending(
            &self,
            before: Timestamp,
            pair: Option<(UserId, UserId)>,
        ) -> Result<u64, DomainError> {
            self.store.purge_abandoned_pending(before, pair).await
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemoryStore,
        gateway: MockPaymentGateway,
        subscriber: UserId,
        creator: UserId,
    }

    fn user(role: UserRole, name: &str) -> UserAccount {
        UserAccount {
            id: UserId::new(),
            user_name: name.to_string(),
            email: format!("{}@example.com", name),
            role,
            gateway_customer_id: None,
        }
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let subscriber = user(UserRole::User, "fan");
        let creator = user(UserRole::ContentCreator, "painter");
        let ids = (subscriber.id, creator.id);
        store.insert_user(subscriber).unwrap();
        store.insert_user(creator).unwrap();
        Fixture {
            store,
            gateway: MockPaymentGateway::new(),
            subscriber: ids.0,
            creator: ids.1,
        }
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            price_ref: "price_creator_monthly".to_string(),
            success_url: "https://app.test/success".to_string(),
            cancel_url: "https://app.test/cancel".to_string(),
            gateway_timeout: Duration::from_millis(200),
            checkout_expiry_hours: 24,
        }
    }

    fn handler(f: &Fixture) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.gateway.clone()),
            settings(),
        )
    }

    fn command(f: &Fixture) -> StartCheckoutCommand {
        StartCheckoutCommand {
            subscriber_id: f.subscriber,
            creator_id: f.creator,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_session_and_pending_row() {
        let f = fixture();

        let result = handler(&f).handle(command(&f)).await.unwrap();

        assert!(result.session.redirect_url.starts_with("https://"));
        let stored = f.store.find_by_id(&result.subscription_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Pending);
        assert_eq!(stored.creator_id, f.creator);

        let session_call = f
            .gateway
            .calls()
            .into_iter()
            .find(|c| c.method == "create_checkout_session")
            .unwrap();
        assert!(session_call.args.contains(&f.creator.to_string()));
    }

    #[tokio::test]
    async fn stores_gateway_customer_id_on_subscriber() {
        let f = fixture();

        handler(&f).handle(command(&f)).await.unwrap();

        let subscriber = f.store.find_user(&f.subscriber).await.unwrap().unwrap();
        assert!(subscriber.gateway_customer_id.is_some());
    }

    #[tokio::test]
    async fn active_subscription_conflicts_without_gateway_call() {
        let f = fixture();
        let mut existing = Subscription::open_checkout(f.subscriber, f.creator).unwrap();
        f.store.insert_pending(&existing).await.unwrap();
        existing
            .apply_payment_succeeded(&GatewayEvent {
                external_event_id: "evt_1".to_string(),
                kind: GatewayEventKind::PaymentSucceeded,
                external_subscription_id: "sub_1".to_string(),
                correlation: Correlation::new(f.subscriber, f.creator),
                amount_cents: Some(700),
                occurred_at: Timestamp::now(),
                period_end: None,
            })
            .unwrap();
        assert_eq!(f.store.update(&existing).await.unwrap(), CommitOutcome::Committed);

        let result = handler(&f).handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Conflict { .. })));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn fresh_pending_checkout_conflicts() {
        let f = fixture();
        handler(&f).handle(command(&f)).await.unwrap();

        let result = handler(&f).handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Conflict { .. })));
        assert_eq!(f.gateway.call_count("create_checkout_session"), 1);
    }

    #[tokio::test]
    async fn checkout_losing_the_insert_race_expires_its_session() {
        let f = fixture();
        let winner = handler(&f).handle(command(&f)).await.unwrap();
        let racing = StartCheckoutHandler::new(
            Arc::new(RacingRepository {
                store: f.store.clone(),
            }),
            Arc::new(f.store.clone()),
            Arc::new(f.gateway.clone()),
            settings(),
        );

        let result = racing.handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Conflict { .. })));
        assert_eq!(f.gateway.call_count("create_checkout_session"), 2);
        let expired = f.gateway.expired_sessions();
        assert_eq!(expired.len(), 1);
        assert_ne!(expired[0], winner.session.session_id);
        assert_eq!(f.store.all_subscriptions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_session_expiry_still_reports_conflict() {
        let f = fixture();
        handler(&f).handle(command(&f)).await.unwrap();
        f.gateway
            .set_method_error("expire_checkout_session", GatewayError::network("reset"));
        let racing = StartCheckoutHandler::new(
            Arc::new(RacingRepository {
                store: f.store.clone(),
            }),
            Arc::new(f.store.clone()),
            Arc::new(f.gateway.clone()),
            settings(),
        );

        let result = racing.handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Conflict { .. })));
        assert!(f.gateway.expired_sessions().is_empty());
    }

    #[tokio::test]
    async fn abandoned_pending_checkout_is_replaced() {
        let f = fixture();
        let mut stale = Subscription::open_checkout(f.subscriber, f.creator).unwrap();
        stale.created_at = Timestamp::now().minus_hours(48);
        f.store.insert_pending(&stale).await.unwrap();

        let result = handler(&f).handle(command(&f)).await.unwrap();

        assert!(f.store.find_by_id(&stale.id).await.unwrap().is_none());
        assert!(f.store.find_by_id(&result.subscription_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn non_creator_target_is_forbidden() {
        let f = fixture();
        let plain = user(UserRole::User, "neighbour");
        let plain_id = plain.id;
        f.store.insert_user(plain).unwrap();

        let result = handler(&f)
            .handle(StartCheckoutCommand {
                subscriber_id: f.subscriber,
                creator_id: plain_id,
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::Forbidden(_))));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_creator_is_not_found() {
        let f = fixture();
        let ghost = UserId::new();

        let result = handler(&f)
            .handle(StartCheckoutCommand {
                subscriber_id: f.subscriber,
                creator_id: ghost,
            })
            .await;

        assert_eq!(result.unwrap_err(), SubscriptionError::user_not_found(ghost));
    }

    #[tokio::test]
    async fn self_subscription_is_invalid() {
        let f = fixture();

        let result = handler(&f)
            .handle(StartCheckoutCommand {
                subscriber_id: f.creator,
                creator_id: f.creator,
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn gateway_failure_writes_nothing() {
        let f = fixture();
        f.gateway
            .set_method_error("create_checkout_session", GatewayError::network("connection reset"));

        let result = handler(&f).handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Upstream { .. })));
        assert!(f.store.all_subscriptions().unwrap().is_empty());
        let subscriber = f.store.find_user(&f.subscriber).await.unwrap().unwrap();
        assert!(subscriber.gateway_customer_id.is_none());
    }

    #[tokio::test]
    async fn slow_gateway_times_out_as_upstream() {
        let f = fixture();
        f.gateway.set_delay(Duration::from_secs(2));

        let result = handler(&f).handle(command(&f)).await;

        assert!(matches!(result, Err(SubscriptionError::Upstream { .. })));
        assert!(f.store.all_subscriptions().unwrap().is_empty());
    }
}
