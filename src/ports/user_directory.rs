//! User directory port.
//!
//! Users are owned elsewhere. The subscription core needs to look them up
//! for role checks and notifications, and to remember the gateway
//! customer id it created for them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::user::UserAccount;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError>;

    async fn save_gateway_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError>;
}
