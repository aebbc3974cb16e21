use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::UserId;

/// Platform role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    User,
    ContentCreator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
            UserRole::ContentCreator => "CONTENT_CREATOR",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            "CONTENT_CREATOR" => Ok(UserRole::ContentCreator),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Read model of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub user_name: String,
    pub email: String,
    pub role: UserRole,
    /// Customer id at the payment gateway, once one was created.
    pub gateway_customer_id: Option<String>,
}

impl UserAccount {
    /// Whether other users can subscribe to this one.
    pub fn is_creator(&self) -> bool {
        self.role == UserRole::ContentCreator
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
