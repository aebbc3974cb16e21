use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{CreatorRanking, Subscription, SubscriptionPayment, SubscriptionStatus};
use crate::domain::user::UserAccount;
use crate::ports::{CommitOutcome, RevenueReader, SubscriptionRepository, UserDirectory};

/// Mutex-guarded store for subscriptions, the ledger and users.
///
/// Every port method takes the lock once, so each call is atomic with
/// respect to every other call.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    payments: Vec<SubscriptionPayment>,
    users: HashMap<UserId, UserAccount>,
}

impl State {
    fn pair_occupied(&self, subscriber_id: &UserId, creator_id: &UserId) -> Option<&Subscription> {
        self.subscriptions.values().find(|s| {
            &s.subscriber_id == subscriber_id && &s.creator_id == creator_id && s.status.occupies_pair()
        })
    }

    fn external_id_taken(&self, subscription: &Subscription) -> bool {
        match &subscription.external_subscription_id {
            Some(external) => self.subscriptions.values().any(|s| {
                s.id != subscription.id && s.external_subscription_id.as_ref() == Some(external)
            }),
            None => false,
        }
    }

    /// Compare-and-swap write. Caller holds the lock.
    fn write(&mut self, subscription: &Subscription) -> Result<CommitOutcome, DomainError> {
        let current_version = match self.subscriptions.get(&subscription.id) {
            Some(current) => current.version,
            None => {
                return Err(DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription not found: {}", subscription.id),
                ))
            }
        };
        if current_version != subscription.version {
            return Ok(CommitOutcome::StaleVersion);
        }
        if self.external_id_taken(subscription) {
            return Err(DomainError::database(
                "external_subscription_id is already bound to another subscription",
            ));
        }
        let mut stored = subscription.clone();
        stored.version += 1;
        self.subscriptions.insert(stored.id, stored);
        Ok(CommitOutcome::Committed)
    }

    fn succeeded_in(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> impl Iterator<Item = &SubscriptionPayment> + '_ {
        let creator_id = creator_id.copied();
        self.payments.iter().filter(move |p| {
            p.is_revenue()
                && !p.paid_at.is_before(&from)
                && p.paid_at.is_before(&to)
                && creator_id.map_or(true, |creator| {
                    self.subscriptions
                        .get(&p.subscription_id)
                        .map_or(false, |s| s.creator_id == creator)
                })
        })
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserAccount) -> Result<(), DomainError> {
        self.state()?.users.insert(user.id, user);
        Ok(())
    }

    /// Every ledger row, in insertion order.
    pub fn all_payments(&self) -> Result<Vec<SubscriptionPayment>, DomainError> {
        Ok(self.state()?.payments.clone())
    }

    pub fn all_subscriptions(&self) -> Result<Vec<Subscription>, DomainError> {
        Ok(self.state()?.subscriptions.values().cloned().collect())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.inner
            .lock()
            .map_err(|_| DomainError::database("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.state()?.subscriptions.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .state()?
            .subscriptions
            .values()
            .find(|s| s.external_subscription_id.as_deref() == Some(external_subscription_id))
            .cloned())
    }

    async fn find_active_or_pending_by_pair(
        &self,
        subscriber_id: &UserId,
        creator_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.state()?.pair_occupied(subscriber_id, creator_id).cloned())
    }

    async fn list_for_subscriber(
        &self,
        subscriber_id: &UserId,
    ) -> Result<Vec<Subscription>, DomainError> {
        let mut list: Vec<Subscription> = self
            .state()?
            .subscriptions
            .values()
            .filter(|s| &s.subscriber_id == subscriber_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn insert_pending(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut state = self.state()?;
        if subscription.status != SubscriptionStatus::Pending {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only pending subscriptions can be inserted",
            ));
        }
        if state
            .pair_occupied(&subscription.subscriber_id, &subscription.creator_id)
            .is_some()
        {
            return Err(DomainError::new(
                ErrorCode::DuplicateSubscription,
                "Pair already has a pending or active subscription",
            ));
        }
        state.subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<CommitOutcome, DomainError> {
        self.state()?.write(subscription)
    }

    async fn payment_exists(&self, external_event_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .state()?
            .payments
            .iter()
            .any(|p| p.external_event_id == external_event_id))
    }

    async fn insert_payment_if_absent(
        &self,
        subscription: &Subscription,
        payment: &SubscriptionPayment,
    ) -> Result<CommitOutcome, DomainError> {
        let mut state = self.state()?;
        if state
            .payments
            .iter()
            .any(|p| p.external_event_id == payment.external_event_id)
        {
            return Ok(CommitOutcome::DuplicateEvent);
        }
        let outcome = state.write(subscription)?;
        if outcome == CommitOutcome::Committed {
            state.payments.push(payment.clone());
        }
        Ok(outcome)
    }

    async fn list_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<SubscriptionPayment>, DomainError> {
        let mut list: Vec<SubscriptionPayment> = self
            .state()?
            .payments
            .iter()
            .filter(|p| &p.subscription_id == subscription_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.paid_at.cmp(&b.paid_at));
        Ok(list)
    }

    async fn purge_abandoned_pending(
        &self,
        created_before: Timestamp,
        pair: Option<(UserId, UserId)>,
    ) -> Result<u64, DomainError> {
        let mut state = self.state()?;
        let doomed: Vec<SubscriptionId> = state
            .subscriptions
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Pending
                    && s.external_subscription_id.is_none()
                    && s.created_at.is_before(&created_before)
                    && pair.map_or(true, |(subscriber, creator)| {
                        s.subscriber_id == subscriber && s.creator_id == creator
                    })
            })
            .map(|s| s.id)
            .collect();
        let has_payments = |id: &SubscriptionId, payments: &[SubscriptionPayment]| {
            payments.iter().any(|p| &p.subscription_id == id)
        };
        let mut removed = 0;
        for id in doomed {
            if !has_payments(&id, &state.payments) {
                state.subscriptions.remove(&id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl RevenueReader for InMemoryStore {
    async fn total_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<i64, DomainError> {
        let state = self.state()?;
        let total: i64 = state.succeeded_in(from, to, creator_id).map(|p| p.amount_cents).sum();
        Ok(total)
    }

    async fn daily_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<Vec<(NaiveDate, i64)>, DomainError> {
        let state = self.state()?;
        let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for payment in state.succeeded_in(from, to, creator_id) {
            *days.entry(payment.paid_at.date()).or_insert(0) += payment.amount_cents;
        }
        Ok(days.into_iter().collect())
    }

    async fn top_creators_by_active_subscriptions(
        &self,
        limit: u32,
    ) -> Result<Vec<CreatorRanking>, DomainError> {
        let state = self.state()?;
        let mut counts: BTreeMap<UserId, i64> = BTreeMap::new();
        for sub in state.subscriptions.values() {
            if sub.status == SubscriptionStatus::Active {
                *counts.entry(sub.creator_id).or_insert(0) += 1;
            }
        }
        let mut ranking: Vec<CreatorRanking> = counts
            .into_iter()
            .map(|(creator_id, active_subscriptions)| CreatorRanking {
                creator_id,
                creator_name: state.users.get(&creator_id).map(|u| u.user_name.clone()),
                active_subscriptions,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.active_subscriptions
                .cmp(&a.active_subscriptions)
                .then(a.creator_id.cmp(&b.creator_id))
        });
        ranking.truncate(limit as usize);
        Ok(ranking)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        Ok(self.state()?.users.get(id).cloned())
    }

    async fn save_gateway_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let mut state = self.state()?;
        let user = state.users.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, format!("User not found: {}", id))
        })?;
        user.gateway_customer_id = Some(customer_id.to_string());
        Ok(())
    }
}
