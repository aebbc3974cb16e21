//! Revenue queries: totals with a dense time series, and top creators.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::foundation::{UserId, ValidationError};
use crate::domain::subscription::{
    dense_series, CreatorRanking, DateRange, RevenueBucketing, RevenuePoint, SubscriptionError,
};
use crate::ports::RevenueReader;

pub const DEFAULT_TOP_CREATORS_LIMIT: u32 = 3;
pub const MAX_TOP_CREATORS_LIMIT: u32 = 100;

/// Revenue for an inclusive range of `YYYY-MM-DD` days.
#[derive(Debug, Clone, Default)]
pub struct GetRevenueReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Restricts the report to one creator's subscriptions.
    pub creator_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bucketing: RevenueBucketing,
    pub total_cents: i64,
    pub series: Vec<RevenuePoint>,
}

pub struct GetRevenueReportHandler {
    reader: Arc<dyn RevenueReader>,
}

impl GetRevenueReportHandler {
    pub fn new(reader: Arc<dyn RevenueReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: GetRevenueReportQuery) -> Result<RevenueReport, SubscriptionError> {
        let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;
        let (from, to) = range.bounds();
        let creator = query.creator_id.as_ref();

        let total_cents = self.reader.total_revenue(from, to, creator).await?;
        let daily = self.reader.daily_revenue(from, to, creator).await?;
        let bucketing = RevenueBucketing::for_range(&range);

        Ok(RevenueReport {
            start_date: range.start(),
            end_date: range.end(),
            bucketing,
            total_cents,
            series: dense_series(&range, bucketing, &daily),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetTopCreatorsQuery {
    pub limit: Option<u32>,
}

pub struct GetTopCreatorsHandler {
    reader: Arc<dyn RevenueReader>,
}

impl GetTopCreatorsHandler {
    pub fn new(reader: Arc<dyn RevenueReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetTopCreatorsQuery,
    ) -> Result<Vec<CreatorRanking>, SubscriptionError> {
        let limit = query.limit.unwrap_or(DEFAULT_TOP_CREATORS_LIMIT);
        if !(1..=MAX_TOP_CREATORS_LIMIT).contains(&limit) {
            return Err(ValidationError::out_of_range(
                "limit",
                1,
                i64::from(MAX_TOP_CREATORS_LIMIT),
                i64::from(limit),
            )
            .into());
        }
        Ok(self.reader.top_creators_by_active_subscriptions(limit).await?)
    }
}
