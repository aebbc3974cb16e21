//! Revenue projections over the ledger.
//!
//! Date ranges are inclusive calendar days in UTC. Series are dense: every
//! bucket in range appears, with zero when nothing was paid.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Ranges longer than this many days are bucketed by month.
pub const MONTHLY_THRESHOLD_DAYS: i64 = 31;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    end_exclusive: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::invalid_format(
                "end_date",
                "end date must not be before start date",
            ));
        }
        let end_exclusive = end
            .succ_opt()
            .ok_or_else(|| ValidationError::invalid_format("end_date", "date out of range"))?;
        Ok(Self {
            start,
            end,
            end_exclusive,
        })
    }

    /// Parses `YYYY-MM-DD` query values. Both are required.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let start = parse_date("start_date", start)?;
        let end = parse_date("end_date", end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Half-open instant bounds `[start 00:00, end+1 00:00)`.
    pub fn bounds(&self) -> (Timestamp, Timestamp) {
        (
            Timestamp::start_of_day(self.start),
            Timestamp::start_of_day(self.end_exclusive),
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Days between start and end, the way bucketing measures length.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::empty_field(field))?;
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ValidationError::invalid_format(field, "expected YYYY-MM-DD"))
}

/// Bucket granularity for revenue series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueBucketing {
    Daily,
    Monthly,
}

impl RevenueBucketing {
    pub fn for_range(range: &DateRange) -> Self {
        if range.span_days() > MONTHLY_THRESHOLD_DAYS {
            RevenueBucketing::Monthly
        } else {
            RevenueBucketing::Daily
        }
    }

    /// Label of the bucket `date` falls in: the day itself, or the first
    /// of its month.
    pub fn bucket_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            RevenueBucketing::Daily => date,
            RevenueBucketing::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    /// Every bucket label touching the range, in order.
    pub fn buckets(&self, range: &DateRange) -> Vec<NaiveDate> {
        let mut labels = Vec::new();
        let mut current = self.bucket_of(range.start);
        while current <= range.end {
            labels.push(current);
            let next = match self {
                RevenueBucketing::Daily => current.succ_opt(),
                RevenueBucketing::Monthly => current.checked_add_months(Months::new(1)),
            };
            match next {
                Some(next) => current = next,
                None => break,
            }
        }
        labels
    }
}

/// One bucket of a revenue series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub bucket: NaiveDate,
    pub amount_cents: i64,
}

/// Folds sparse per-day totals into a dense series over `range`.
///
/// Days outside the range are ignored.
pub fn dense_series(
    range: &DateRange,
    bucketing: RevenueBucketing,
    daily_totals: &[(NaiveDate, i64)],
) -> Vec<RevenuePoint> {
    let mut sums: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (day, amount) in daily_totals {
        if range.contains(*day) {
            *sums.entry(bucketing.bucket_of(*day)).or_insert(0) += amount;
        }
    }
    bucketing
        .buckets(range)
        .into_iter()
        .map(|bucket| RevenuePoint {
            bucket,
            amount_cents: sums.get(&bucket).copied().unwrap_or(0),
        })
        .collect()
}

/// A creator ranked by active subscription count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRanking {
    pub creator_id: UserId,
    pub creator_name: Option<String>,
    pub active_subscriptions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dense_series_fills_empty_days_with_zero() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        let series = dense_series(&range, RevenueBucketing::Daily, &[(date(2024, 1, 2), 700)]);

        assert_eq!(
            series,
            vec![
                RevenuePoint { bucket: date(2024, 1, 1), amount_cents: 0 },
                RevenuePoint { bucket: date(2024, 1, 2), amount_cents: 700 },
                RevenuePoint { bucket: date(2024, 1, 3), amount_cents: 0 },
            ]
        );
    }

    #[test]
    fn thirty_one_day_span_stays_daily() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 2, 1)).unwrap();
        assert_eq!(range.span_days(), 31);
        assert_eq!(RevenueBucketing::for_range(&range), RevenueBucketing::Daily);
    }

    #[test]
    fn longer_span_is_monthly() {
        let range = DateRange::new(date(2024, 1, 15), date(2024, 3, 10)).unwrap();
        assert_eq!(RevenueBucketing::for_range(&range), RevenueBucketing::Monthly);

        let series = dense_series(
            &range,
            RevenueBucketing::Monthly,
            &[(date(2024, 1, 20), 700), (date(2024, 1, 31), 300), (date(2024, 3, 1), 50)],
        );
        assert_eq!(
            series,
            vec![
                RevenuePoint { bucket: date(2024, 1, 1), amount_cents: 1_000 },
                RevenuePoint { bucket: date(2024, 2, 1), amount_cents: 0 },
                RevenuePoint { bucket: date(2024, 3, 1), amount_cents: 50 },
            ]
        );
    }

    #[test]
    fn monthly_buckets_do_not_skip_short_months() {
        let range = DateRange::new(date(2024, 1, 31), date(2024, 4, 1)).unwrap();
        assert_eq!(
            RevenueBucketing::Monthly.buckets(&range),
            vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1), date(2024, 4, 1)]
        );
    }

    #[test]
    fn days_outside_range_are_ignored() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).unwrap();
        let series = dense_series(&range, RevenueBucketing::Daily, &[(date(2023, 12, 31), 900)]);
        assert_eq!(series, vec![RevenuePoint { bucket: date(2024, 1, 1), amount_cents: 0 }]);
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(DateRange::new(date(2024, 1, 2), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn parse_requires_both_dates() {
        assert_eq!(
            DateRange::parse(None, Some("2024-01-01")),
            Err(ValidationError::empty_field("start_date"))
        );
        assert!(matches!(
            DateRange::parse(Some("01/02/2024"), Some("2024-01-03")),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn bounds_include_the_whole_end_day() {
        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-03")).unwrap();
        let (from, to) = range.bounds();
        assert_eq!(from, Timestamp::start_of_day(date(2024, 1, 1)));
        assert_eq!(to, Timestamp::start_of_day(date(2024, 1, 4)));
    }

    proptest! {
        #[test]
        fn dense_series_preserves_total_and_covers_every_bucket(
            offset in 0i64..400,
            span in 0i64..400,
            payments in proptest::collection::vec((0i64..400, 0i64..10_000), 0..40),
        ) {
            let start = date(2023, 1, 1) + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(span);
            let range = DateRange::new(start, end).unwrap();
            let bucketing = RevenueBucketing::for_range(&range);
            let totals: Vec<(NaiveDate, i64)> = payments
                .iter()
                .map(|(day, amount)| (start + chrono::Duration::days(day % (span + 1)), *amount))
                .collect();

            let series = dense_series(&range, bucketing, &totals);

            let expected: i64 = totals.iter().map(|(_, a)| a).sum();
            prop_assert_eq!(series.iter().map(|p| p.amount_cents).sum::<i64>(), expected);
            prop_assert_eq!(series.len(), bucketing.buckets(&range).len());
            if bucketing == RevenueBucketing::Daily {
                prop_assert_eq!(series.len() as i64, span + 1);
            }
            prop_assert!(series.windows(2).all(|w| w[0].bucket < w[1].bucket));
        }
    }
}
