//! Helpers shared by the subscription handlers.

use std::future::Future;
use std::time::Duration;

use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{
    GatewayError, NotificationKind, SubscriptionNotification, SubscriptionNotifier, UserDirectory,
};

/// Runs a gateway call under `timeout`, mapping every failure to `Upstream`.
pub(super) async fn call_gateway<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, SubscriptionError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::error!(
                operation,
                error = %err,
                provider_code = err.provider_code.as_deref().unwrap_or(""),
                "Payment gateway call failed"
            );
            Err(SubscriptionError::upstream(operation, err.to_string()))
        }
        Err(_) => {
            tracing::error!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Payment gateway call timed out"
            );
            Err(SubscriptionError::upstream(
                operation,
                GatewayError::timeout(operation).to_string(),
            ))
        }
    }
}

/// Sends a notification to the subscriber. Failures are logged, never returned.
pub(super) async fn notify_subscriber(
    users: &dyn UserDirectory,
    notifier: &dyn SubscriptionNotifier,
    kind: NotificationKind,
    subscription: &Subscription,
) {
    let subscriber = users.find_user(&subscription.subscriber_id).await;
    let creator = users.find_user(&subscription.creator_id).await;
    let (subscriber, creator) = match (subscriber, creator) {
        (Ok(Some(subscriber)), Ok(Some(creator))) => (subscriber, creator),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(subscription_id = %subscription.id, error = %e, "Notification skipped");
            return;
        }
        _ => {
            tracing::warn!(
                subscription_id = %subscription.id,
                "Notification skipped, subscriber or creator unknown"
            );
            return;
        }
    };

    let notification = SubscriptionNotification {
        kind,
        recipient_email: subscriber.email,
        creator_name: creator.user_name,
    };
    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(
            subscription_id = %subscription.id,
            ?kind,
            error = %e,
            "Failed to send subscription notification"
        );
    }
}
