//! PostgreSQL implementation of UserDirectory.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::user::{UserAccount, UserRole};
use crate::ports::UserDirectory;

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    user_name: String,
    email: String,
    role: String,
    gateway_customer_id: Option<String>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: UserRole = row
            .role
            .parse()
            .map_err(|_| DomainError::database(format!("Invalid user role: {}", row.role)))?;
        Ok(UserAccount {
            id: UserId::from_uuid(row.id),
            user_name: row.user_name,
            email: row.email,
            role,
            gateway_customer_id: row.gateway_customer_id,
        })
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, user_name, email, role, gateway_customer_id FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find user: {}", e)))?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn save_gateway_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE users SET gateway_customer_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to save gateway customer id: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::UserNotFound,
                format!("User not found: {}", id),
            ));
        }
        Ok(())
    }
}
