//! Ledger rows produced by gateway payment events.
//!
//! Rows are append-only. Money is stored as i64 minor units, never floats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp, ValidationError};

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// One ledger entry.
///
/// `external_event_id` is unique across the ledger: a redelivered gateway
/// event can never produce a second row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Timestamp,
    pub external_event_id: String,
}

impl SubscriptionPayment {
    /// Builds a ledger row, rejecting negative amounts and blank event ids.
    pub fn record(
        subscription_id: SubscriptionId,
        amount_cents: i64,
        status: PaymentStatus,
        paid_at: Timestamp,
        external_event_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let external_event_id = external_event_id.into();
        if external_event_id.trim().is_empty() {
            return Err(ValidationError::empty_field("external_event_id"));
        }
        if amount_cents < 0 {
            return Err(ValidationError::out_of_range(
                "amount_cents",
                0,
                i64::MAX,
                amount_cents,
            ));
        }
        Ok(Self {
            id: PaymentId::new(),
            subscription_id,
            amount_cents,
            status,
            paid_at,
            external_event_id,
        })
    }

    /// Whether this row counts toward revenue.
    pub fn is_revenue(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}
