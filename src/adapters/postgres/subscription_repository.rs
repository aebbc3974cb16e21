//! PostgreSQL implementation of SubscriptionRepository.
//!
//! The pair invariant lives in the partial unique index
//! `subscriptions_open_pair_key`; ledger idempotency in the unique
//! constraint on `external_event_id`. Writes to an existing row are
//! `UPDATE ... WHERE version = $n`, so a concurrent writer shows up as
//! zero affected rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::subscription::{
    PaymentStatus, Subscription, SubscriptionPayment, SubscriptionStatus,
};
use crate::ports::{CommitOutcome, SubscriptionRepository};

const OPEN_PAIR_CONSTRAINT: &str = "subscriptions_open_pair_key";

const SUBSCRIPTION_COLUMNS: &str = "id, subscriber_id, creator_id, status, external_subscription_id, \
     start_date, end_date, created_at, updated_at, version";

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn select_where(condition: &str) -> String {
    format!(
        "SELECT {} FROM subscriptions WHERE {}",
        SUBSCRIPTION_COLUMNS, condition
    )
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    subscriber_id: Uuid,
    creator_id: Uuid,
    status: String,
    external_subscription_id: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus = row.status.parse().map_err(|_| {
            DomainError::database(format!("Invalid subscription status: {}", row.status))
        })?;
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            subscriber_id: UserId::from_uuid(row.subscriber_id),
            creator_id: UserId::from_uuid(row.creator_id),
            status,
            external_subscription_id: row.external_subscription_id,
            start_date: row.start_date.map(Timestamp::from_datetime),
            end_date: row.end_date.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Uuid,
    amount_cents: i64,
    status: String,
    paid_at: DateTime<Utc>,
    external_event_id: String,
}

impl TryFrom<PaymentRow> for SubscriptionPayment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status: PaymentStatus = row.status.parse().map_err(|_| {
            DomainError::database(format!("Invalid payment status: {}", row.status))
        })?;
        Ok(SubscriptionPayment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            amount_cents: row.amount_cents,
            status,
            paid_at: Timestamp::from_datetime(row.paid_at),
            external_event_id: row.external_event_id,
        })
    }
}

fn database_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

fn violates(e: &sqlx::Error, constraint: &str) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

fn optional_datetime(ts: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.as_ref().map(|t| *t.as_datetime())
}

/// Version-checked update inside `tx`. Returns false when the version moved.
async fn compare_and_swap(
    tx: &mut Transaction<'_, Postgres>,
    subscription: &Subscription,
) -> Result<bool, DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET
            status = $3,
            external_subscription_id = $4,
            start_date = $5,
            end_date = $6,
            updated_at = $7,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(subscription.id.as_uuid())
    .bind(subscription.version)
    .bind(subscription.status.as_str())
    .bind(&subscription.external_subscription_id)
    .bind(optional_datetime(&subscription.start_date))
    .bind(optional_datetime(&subscription.end_date))
    .bind(subscription.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| database_error("update subscription", e))?;

    if result.rows_affected() == 1 {
        return Ok(true);
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE id = $1)")
        .bind(subscription.id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| database_error("check subscription", e))?;
    if !exists {
        return Err(DomainError::new(
            ErrorCode::SubscriptionNotFound,
            format!("Subscription not found: {}", subscription.id),
        ));
    }
    Ok(false)
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&select_where("id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("find subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&select_where("external_subscription_id = $1"))
                .bind(external_subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("find subscription by gateway id", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn find_active_or_pending_by_pair(
        &self,
        subscriber_id: &UserId,
        creator_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&select_where(
            "subscriber_id = $1 AND creator_id = $2 AND status IN ('pending', 'active')",
        ))
        .bind(subscriber_id.as_uuid())
        .bind(creator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find subscription by pair", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn list_for_subscriber(
        &self,
        subscriber_id: &UserId,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = select_where("subscriber_id = $1 ORDER BY created_at DESC, id DESC");
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(subscriber_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list subscriptions", e))?;
        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn insert_pending(&self, subscription: &Subscription) -> Result<(), DomainError> {
        if subscription.status != SubscriptionStatus::Pending {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only pending subscriptions can be inserted",
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, subscriber_id, creator_id, status, external_subscription_id,
                start_date, end_date, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.subscriber_id.as_uuid())
        .bind(subscription.creator_id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(&subscription.external_subscription_id)
        .bind(optional_datetime(&subscription.start_date))
        .bind(optional_datetime(&subscription.end_date))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, OPEN_PAIR_CONSTRAINT) {
                return DomainError::new(
                    ErrorCode::DuplicateSubscription,
                    "Pair already has a pending or active subscription",
                );
            }
            database_error("insert subscription", e)
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<CommitOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin transaction", e))?;

        if !compare_and_swap(&mut tx, subscription).await? {
            return Ok(CommitOutcome::StaleVersion);
        }

        tx.commit()
            .await
            .map_err(|e| database_error("commit subscription update", e))?;
        Ok(CommitOutcome::Committed)
    }

    async fn payment_exists(&self, external_event_id: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscription_payments WHERE external_event_id = $1)",
        )
        .bind(external_event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("check payment", e))
    }

    async fn insert_payment_if_absent(
        &self,
        subscription: &Subscription,
        payment: &SubscriptionPayment,
    ) -> Result<CommitOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin transaction", e))?;

        // Blocks on a concurrent insert of the same event until it commits.
        let inserted = sqlx::query(
            r#"
            INSERT INTO subscription_payments (
                id, subscription_id, amount_cents, status, paid_at, external_event_id
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_event_id) DO NOTHING
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.subscription_id.as_uuid())
        .bind(payment.amount_cents)
        .bind(payment.status.as_str())
        .bind(payment.paid_at.as_datetime())
        .bind(&payment.external_event_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("insert payment", e))?;

        if inserted.rows_affected() == 0 {
            return Ok(CommitOutcome::DuplicateEvent);
        }

        if !compare_and_swap(&mut tx, subscription).await? {
            return Ok(CommitOutcome::StaleVersion);
        }

        tx.commit()
            .await
            .map_err(|e| database_error("commit payment", e))?;
        Ok(CommitOutcome::Committed)
    }

    async fn list_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<SubscriptionPayment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, amount_cents, status, paid_at, external_event_id
            FROM subscription_payments
            WHERE subscription_id = $1
            ORDER BY paid_at ASC, id ASC
            "#,
        )
        .bind(subscription_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("list payments", e))?;
        rows.into_iter().map(SubscriptionPayment::try_from).collect()
    }

    async fn purge_abandoned_pending(
        &self,
        created_before: Timestamp,
        pair: Option<(UserId, UserId)>,
    ) -> Result<u64, DomainError> {
        let (subscriber, creator) = match pair {
            Some((subscriber, creator)) => (Some(*subscriber.as_uuid()), Some(*creator.as_uuid())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            DELETE FROM subscriptions s
            WHERE s.status = 'pending'
              AND s.external_subscription_id IS NULL
              AND s.created_at < $1
              AND ($2::uuid IS NULL OR (s.subscriber_id = $2 AND s.creator_id = $3))
              AND NOT EXISTS (
                  SELECT 1 FROM subscription_payments p WHERE p.subscription_id = s.id
              )
            "#,
        )
        .bind(created_before.as_datetime())
        .bind(subscriber)
        .bind(creator)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("purge abandoned checkouts", e))?;

        Ok(result.rows_affected())
    }
}
