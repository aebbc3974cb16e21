//! Subscription status state machine.
//!
//! A subscription moves forward only: it waits for its first payment,
//! becomes active, and ends canceled.

use crate::domain::foundation::{DomainError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout started, no successful payment yet.
    Pending,

    /// At least one payment succeeded and the subscription is not canceled.
    Active,

    /// Ended by the subscriber or by the payment gateway.
    Canceled,
}

impl SubscriptionStatus {
    /// Statuses that occupy the subscriber/creator pair.
    ///
    /// At most one subscription per pair may be in one of these.
    pub fn occupies_pair(&self) -> bool {
        matches!(self, SubscriptionStatus::Pending | SubscriptionStatus::Active)
    }

    /// Forward-only moves. Pending may also be canceled outright.
    pub fn can_transition_to(&self, target: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active) | (Pending, Canceled) | (Active, Canceled)
        )
    }

    /// Canceled has no way out; a returning subscriber gets a new row.
    pub fn is_terminal(&self) -> bool {
        *self == SubscriptionStatus::Canceled
    }

    /// Returns `target` if the move is legal.
    pub fn advance_to(self, target: SubscriptionStatus) -> Result<Self, DomainError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move subscription from {} to {}", self, target),
            )
            .with_detail("status", self.as_str()))
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(format!("Unknown subscription status: {}", other)),
        }
    }
}
