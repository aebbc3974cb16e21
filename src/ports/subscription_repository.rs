//! Subscription repository port.
//!
//! Every mutation is an explicit, invariant-preserving operation rather
//! than a generic save. Writes to an existing subscription are
//! compare-and-swap on `version`, so user cancellation and webhook
//! reconciliation serialize on the same row.
//!
//! # Example
//!
//! ```ignore
//! let mut sub = repo.find_by_id(&id).await?.ok_or(...)?;
//! sub.cancel_by_subscriber(Timestamp::now())?;
//! match repo.update(&sub).await? {
//!     CommitOutcome::Committed => {}
//!     CommitOutcome::StaleVersion => { /* reload and retry */ }
//!     CommitOutcome::DuplicateEvent => unreachable_for_updates(),
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionPayment};

/// Result of an atomic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The write is durable.
    Committed,
    /// A ledger row with the same external event id already exists.
    /// Nothing was written.
    DuplicateEvent,
    /// The row changed since it was read. Nothing was written.
    StaleVersion,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The subscription occupying the pair (Pending or Active), if any.
    async fn find_active_or_pending_by_pair(
        &self,
        subscriber_id: &UserId,
        creator_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// All subscriptions of a subscriber, newest first.
    async fn list_for_subscriber(
        &self,
        subscriber_id: &UserId,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Inserts a new Pending subscription.
    ///
    /// # Errors
    ///
    /// - `DuplicateSubscription` if the pair is already occupied
    /// - `DatabaseError` on persistence failure
    async fn insert_pending(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Writes `subscription` if the stored version still equals
    /// `subscription.version`, bumping it by one.
    async fn update(&self, subscription: &Subscription) -> Result<CommitOutcome, DomainError>;

    /// Whether a ledger row exists for this gateway event.
    async fn payment_exists(&self, external_event_id: &str) -> Result<bool, DomainError>;

    /// Appends `payment` and writes `subscription` in one unit.
    ///
    /// Returns `DuplicateEvent` when the event id is already in the ledger
    /// and `StaleVersion` when the subscription changed since it was read;
    /// in both cases nothing is written.
    async fn insert_payment_if_absent(
        &self,
        subscription: &Subscription,
        payment: &SubscriptionPayment,
    ) -> Result<CommitOutcome, DomainError>;

    /// Ledger rows of one subscription, oldest first.
    async fn list_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<SubscriptionPayment>, DomainError>;

    /// Deletes Pending subscriptions without a gateway binding created
    /// before `created_before`. Restricted to one pair when given.
    ///
    /// Returns the number of rows removed.
    async fn purge_abandoned_pending(
        &self,
        created_before: Timestamp,
        pair: Option<(UserId, UserId)>,
    ) -> Result<u64, DomainError>;
}
