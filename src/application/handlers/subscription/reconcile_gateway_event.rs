//! ReconcileGatewayEventHandler - Applies one normalized gateway event.
//!
//! Per event: idempotency gate on the gateway event id, resolution of the
//! local subscription (by gateway id, then by the Pending row the checkout
//! was opened for on the first payment), then one atomic write of the state change together
//! with its ledger row. A lost compare-and-swap reloads and starts over,
//! so two events for the same subscription serialize on its row.

use std::sync::Arc;

use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{
    GatewayEvent, GatewayEventKind, PaymentOutcome, PaymentStatus, Subscription,
    SubscriptionError, SubscriptionPayment, SubscriptionStatus,
};
use crate::ports::{
    CommitOutcome, NotificationKind, SubscriptionNotifier, SubscriptionRepository, UserDirectory,
};

use super::support::notify_subscriber;

/// Attempts before a write that keeps losing the version race gives up.
pub const MAX_COMMIT_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event changed local state.
    Applied {
        subscription_id: SubscriptionId,
        status: SubscriptionStatus,
    },
    /// The event was seen before. Nothing was written.
    AlreadyApplied,
}

/// Side effect to run once the write is durable.
enum Followup {
    None,
    Notify(NotificationKind),
}

pub struct ReconcileGatewayEventHandler {
    repository: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn SubscriptionNotifier>,
}

impl ReconcileGatewayEventHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn SubscriptionNotifier>,
    ) -> Self {
        Self {
            repository,
            users,
            notifier,
        }
    }

    pub async fn handle(&self, event: GatewayEvent) -> Result<ReconcileOutcome, SubscriptionError> {
        let amount_cents = Self::validate(&event)?;
        let mut attempt = 0;

        loop {
            attempt += 1;

            // 1. Idempotency gate
            if event.kind.is_payment() && self.repository.payment_exists(&event.external_event_id).await? {
                tracing::debug!(
                    external_event_id = %event.external_event_id,
                    "Gateway event already applied"
                );
                return Ok(ReconcileOutcome::AlreadyApplied);
            }

            // 2. Resolve
            let current = self.resolve(&event).await?;

            // 3. Apply and commit
            let mut next = current.clone();
            let (commit, followup) = match event.kind {
                GatewayEventKind::PaymentSucceeded => {
                    let outcome = next.apply_payment_succeeded(&event)?;
                    let payment = SubscriptionPayment::record(
                        next.id,
                        amount_cents,
                        PaymentStatus::Succeeded,
                        event.occurred_at,
                        event.external_event_id.as_str(),
                    )?;
                    let followup = match outcome {
                        PaymentOutcome::Activated => Followup::Notify(NotificationKind::Confirmed),
                        PaymentOutcome::Renewed | PaymentOutcome::Recorded => Followup::None,
                    };
                    (
                        self.repository.insert_payment_if_absent(&next, &payment).await?,
                        followup,
                    )
                }
                GatewayEventKind::PaymentFailed => {
                    next.apply_payment_failed(&event)?;
                    let payment = SubscriptionPayment::record(
                        next.id,
                        amount_cents,
                        PaymentStatus::Failed,
                        event.occurred_at,
                        event.external_event_id.as_str(),
                    )?;
                    (
                        self.repository.insert_payment_if_absent(&next, &payment).await?,
                        Followup::None,
                    )
                }
                GatewayEventKind::SubscriptionCanceled => {
                    let newly_canceled = next.apply_gateway_cancellation(&event)?;
                    if !newly_canceled
                        && next.end_date == current.end_date
                        && next.external_subscription_id == current.external_subscription_id
                    {
                        return Ok(ReconcileOutcome::AlreadyApplied);
                    }
                    let followup = if newly_canceled {
                        Followup::Notify(NotificationKind::Canceled)
                    } else {
                        Followup::None
                    };
                    (self.repository.update(&next).await?, followup)
                }
            };

            match commit {
                CommitOutcome::Committed => {
                    tracing::info!(
                        subscription_id = %next.id,
                        external_event_id = %event.external_event_id,
                        kind = ?event.kind,
                        from = %current.status,
                        to = %next.status,
                        "Gateway event applied"
                    );
                    if let Followup::Notify(kind) = followup {
                        notify_subscriber(self.users.as_ref(), self.notifier.as_ref(), kind, &next)
                            .await;
                    }
                    return Ok(ReconcileOutcome::Applied {
                        subscription_id: next.id,
                        status: next.status,
                    });
                }
                CommitOutcome::DuplicateEvent => {
                    // A concurrent delivery of the same event won.
                    return Ok(ReconcileOutcome::AlreadyApplied);
                }
                CommitOutcome::StaleVersion if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        subscription_id = %next.id,
                        attempt,
                        "Version conflict while reconciling, retrying"
                    );
                }
                CommitOutcome::StaleVersion => {
                    tracing::error!(
                        subscription_id = %next.id,
                        external_event_id = %event.external_event_id,
                        attempts = attempt,
                        "Gave up reconciling after repeated version conflicts"
                    );
                    return Err(SubscriptionError::Contention(next.id));
                }
            }
        }
    }

    /// Payment events must carry a non-negative amount. Returns the amount.
    fn validate(event: &GatewayEvent) -> Result<i64, SubscriptionError> {
        if event.external_event_id.trim().is_empty() {
            return Err(SubscriptionError::validation(
                "external_event_id",
                "Gateway event id is empty",
            ));
        }
        if event.external_subscription_id.trim().is_empty() {
            return Err(SubscriptionError::validation(
                "external_subscription_id",
                "Gateway subscription id is empty",
            ));
        }
        if !event.kind.is_payment() {
            return Ok(0);
        }
        match event.amount_cents {
            Some(amount) if amount >= 0 => Ok(amount),
            Some(_) => Err(SubscriptionError::validation(
                "amount_cents",
                "Payment amount must not be negative",
            )),
            None => Err(SubscriptionError::validation(
                "amount_cents",
                "Payment event without amount",
            )),
        }
    }

    async fn resolve(&self, event: &GatewayEvent) -> Result<Subscription, SubscriptionError> {
        if let Some(bound) = self
            .repository
            .find_by_external_id(&event.external_subscription_id)
            .await?
        {
            return Ok(bound);
        }

        if let Some((subscriber_id, creator_id)) = event.correlation.pair() {
            let pending = self
                .repository
                .find_active_or_pending_by_pair(&subscriber_id, &creator_id)
                .await?
                .filter(|s| {
                    s.status == SubscriptionStatus::Pending && s.external_subscription_id.is_none()
                });
            match pending {
                Some(pending) if event.correlation.may_bind(pending.id) => return Ok(pending),
                Some(pending) => {
                    // Paid session from a checkout that lost the race for the pair.
                    tracing::warn!(
                        external_event_id = %event.external_event_id,
                        pending_id = %pending.id,
                        checkout_subscription_id = ?event.correlation.subscription_id,
                        "Gateway event belongs to another checkout for this pair"
                    );
                }
                None => {}
            }
        }

        tracing::warn!(
            external_event_id = %event.external_event_id,
            external_subscription_id = %event.external_subscription_id,
            subscriber_id = ?event.correlation.subscriber_id,
            creator_id = ?event.correlation.creator_id,
            "Gateway event matches no local subscription"
        );
        Err(SubscriptionError::OrphanEvent {
            external_event_id: event.external_event_id.clone(),
            external_subscription_id: event.external_subscription_id.clone(),
        })
    }
}
