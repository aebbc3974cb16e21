//! PostgreSQL implementation of RevenueReader.
//!
//! Aggregations run in the database over succeeded ledger rows. Day
//! boundaries are UTC.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::CreatorRanking;
use crate::ports::RevenueReader;

pub struct PostgresRevenueReader {
    pool: PgPool,
}

impl PostgresRevenueReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DailyRow {
    day: NaiveDate,
    amount_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RankingRow {
    creator_id: Uuid,
    creator_name: Option<String>,
    active_subscriptions: i64,
}

impl From<RankingRow> for CreatorRanking {
    fn from(row: RankingRow) -> Self {
        CreatorRanking {
            creator_id: UserId::from_uuid(row.creator_id),
            creator_name: row.creator_name,
            active_subscriptions: row.active_subscriptions,
        }
    }
}

fn database_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl RevenueReader for PostgresRevenueReader {
    async fn total_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount_cents), 0)::BIGINT
            FROM subscription_payments p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE p.status = 'succeeded'
              AND p.paid_at >= $1
              AND p.paid_at < $2
              AND ($3::uuid IS NULL OR s.creator_id = $3)
            "#,
        )
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .bind(creator_id.map(|id| *id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("sum revenue", e))
    }

    async fn daily_revenue(
        &self,
        from: Timestamp,
        to: Timestamp,
        creator_id: Option<&UserId>,
    ) -> Result<Vec<(NaiveDate, i64)>, DomainError> {
        let rows: Vec<DailyRow> = sqlx::query_as(
            r#"
            SELECT (p.paid_at AT TIME ZONE 'UTC')::date AS day,
                   SUM(p.amount_cents)::BIGINT AS amount_cents
            FROM subscription_payments p
            JOIN subscriptions s ON s.id = p.subscription_id
            WHERE p.status = 'succeeded'
              AND p.paid_at >= $1
              AND p.paid_at < $2
              AND ($3::uuid IS NULL OR s.creator_id = $3)
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .bind(creator_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("group revenue by day", e))?;

        Ok(rows.into_iter().map(|r| (r.day, r.amount_cents)).collect())
    }

    async fn top_creators_by_active_subscriptions(
        &self,
        limit: u32,
    ) -> Result<Vec<CreatorRanking>, DomainError> {
        let rows: Vec<RankingRow> = sqlx::query_as(
            r#"
            SELECT s.creator_id,
                   u.user_name AS creator_name,
                   COUNT(*)::BIGINT AS active_subscriptions
            FROM subscriptions s
            LEFT JOIN users u ON u.id = s.creator_id
            WHERE s.status = 'active'
            GROUP BY s.creator_id, u.user_name
            ORDER BY active_subscriptions DESC, s.creator_id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("rank creators", e))?;

        Ok(rows.into_iter().map(CreatorRanking::from).collect())
    }
}
