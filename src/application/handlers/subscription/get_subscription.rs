//! Read-side handlers: a subscriber's subscriptions and one subscription's detail.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::{SubscriptionId, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionPayment};
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct ListSubscriptionsQuery {
    pub subscriber_id: UserId,
}

pub struct ListSubscriptionsHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl ListSubscriptionsHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    /// Every subscription of the caller, newest first, in any status.
    pub async fn handle(
        &self,
        query: ListSubscriptionsQuery,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self
            .repository
            .list_for_subscriber(&query.subscriber_id)
            .await?)
    }
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub subscriber_id: UserId,
    pub subscription_id: SubscriptionId,
}

/// A subscription together with its payment history.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetail {
    pub subscription: Subscription,
    pub payments: Vec<SubscriptionPayment>,
}

pub struct GetSubscriptionHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetSubscriptionHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<SubscriptionDetail, SubscriptionError> {
        let subscription = self
            .repository
            .find_by_id(&query.subscription_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(query.subscription_id))?;

        if !subscription.is_owned_by(&query.subscriber_id) {
            return Err(SubscriptionError::forbidden(
                "Subscription belongs to another user",
            ));
        }

        let payments = self.repository.list_payments(&subscription.id).await?;
        Ok(SubscriptionDetail {
            subscription,
            payments,
        })
    }
}
