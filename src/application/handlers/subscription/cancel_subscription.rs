//! CancelSubscriptionHandler - Command handler for subscriber cancellation.
//!
//! The remote subscription is canceled first. Local state changes only
//! after the gateway confirmed, through the same compare-and-swap write
//! the reconciler uses, so a racing webhook cannot be overwritten.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{
    CommitOutcome, NotificationKind, PaymentGateway, SubscriptionNotifier, SubscriptionRepository,
    UserDirectory,
};

use super::reconcile_gateway_event::MAX_COMMIT_ATTEMPTS;
use super::support::{call_gateway, notify_subscriber};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscriber_id: UserId,
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
}

pub struct CancelSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn SubscriptionNotifier>,
    gateway_timeout: Duration,
}

impl CancelSubscriptionHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn SubscriptionNotifier>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            gateway,
            users,
            notifier,
            gateway_timeout,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        // 1. Existence, status and ownership, before any gateway traffic
        let mut subscription = self
            .repository
            .find_by_id(&cmd.subscription_id)
            .await?
            .filter(|s| s.status == SubscriptionStatus::Active)
            .ok_or_else(|| SubscriptionError::not_found(cmd.subscription_id))?;

        if !subscription.is_owned_by(&cmd.subscriber_id) {
            tracing::warn!(
                subscription_id = %cmd.subscription_id,
                caller = %cmd.subscriber_id,
                "Cancel rejected, caller does not own subscription"
            );
            return Err(SubscriptionError::forbidden(
                "Subscription belongs to another user",
            ));
        }

        let external_id = subscription.external_subscription_id.clone().ok_or_else(|| {
            SubscriptionError::infrastructure(format!(
                "Active subscription {} has no gateway binding",
                subscription.id
            ))
        })?;

        // 2. Remote cancellation; on failure nothing local changes
        call_gateway(
            self.gateway_timeout,
            "cancel_remote_subscription",
            self.gateway.cancel_remote_subscription(&external_id),
        )
        .await?;

        // 3. Local transition, retried against concurrent writers
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut next = subscription.clone();
            next.cancel_by_subscriber(Timestamp::now())?;

            match self.repository.update(&next).await? {
                CommitOutcome::Committed => {
                    tracing::info!(
                        subscription_id = %next.id,
                        external_subscription_id = %external_id,
                        "Subscription canceled by subscriber"
                    );
                    notify_subscriber(
                        self.users.as_ref(),
                        self.notifier.as_ref(),
                        NotificationKind::Canceled,
                        &next,
                    )
                    .await;
                    next.version += 1;
                    return Ok(CancelSubscriptionResult { subscription: next });
                }
                CommitOutcome::StaleVersion => {
                    subscription = self
                        .repository
                        .find_by_id(&cmd.subscription_id)
                        .await?
                        .ok_or_else(|| SubscriptionError::not_found(cmd.subscription_id))?;
                    if subscription.status == SubscriptionStatus::Canceled {
                        // The gateway's own cancellation event got here first.
                        return Ok(CancelSubscriptionResult { subscription });
                    }
                }
                CommitOutcome::DuplicateEvent => {
                    return Err(SubscriptionError::infrastructure(
                        "Unexpected duplicate event outcome for a plain update",
                    ));
                }
            }
        }

        Err(SubscriptionError::Contention(cmd.subscription_id))
    }
}
