//! Revenue reader port (read side).
//!
//! Only `Succeeded` ledger rows count. Instant ranges are half-open
//! `[from, to)`; callers build them from inclusive calendar days.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::CreatorRanking;

#[async_trait]
pub trait RevenueReader: Send + Sync {
    /// Sum of succeeded payments paid in `[from, to)`, optionally for one creator.
    async fn total_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<i64, DomainError>;

    /// Per-day sums of succeeded payments in `[from, to)`. Days without
    /// payments may be omitted.
    async fn daily_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<Vec<(NaiveDate, i64)>, DomainError>;

    /// Creators by number of Active subscriptions, descending, ties by creator id.
    async fn top_creators_by_active_subscriptions(
        &self,
        limit: u32,
    ) -> Result<Vec<CreatorRanking>, DomainError>;
}
