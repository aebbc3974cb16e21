//! PurgeAbandonedCheckoutsHandler - Removes Pending rows whose checkout expired.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::SubscriptionError;
use crate::ports::SubscriptionRepository;

pub struct PurgeAbandonedCheckoutsHandler {
    repository: Arc<dyn SubscriptionRepository>,
    checkout_expiry_hours: i64,
}

impl PurgeAbandonedCheckoutsHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, checkout_expiry_hours: i64) -> Self {
        Self {
            repository,
            checkout_expiry_hours,
        }
    }

    /// Deletes every unbound Pending row older than the checkout expiry.
    /// Returns how many were removed.
    pub async fn handle(&self, now: Timestamp) -> Result<u64, SubscriptionError> {
        let cutoff = now.minus_hours(self.checkout_expiry_hours);
        let removed = self.repository.purge_abandoned_pending(cutoff, None).await?;
        if removed > 0 {
            tracing::info!(removed, "Purged abandoned checkouts");
        }
        Ok(removed)
    }
}
