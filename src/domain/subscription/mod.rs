//! Subscription domain module.
//!
//! The recurring paid relationship between a subscriber and a content
//! creator, the ledger of gateway payments it produces, and the revenue
//! projections computed over that ledger.
//!
//! # Module Structure
//!
//! - `status` - SubscriptionStatus state machine
//! - `aggregate` - Subscription aggregate with one transition per event type
//! - `payment` - append-only ledger rows
//! - `gateway_event` - normalized payment gateway lifecycle events
//! - `revenue` - date ranges, bucketing and dense series
//! - `errors` - error taxonomy surfaced by the subscription use cases
//! - `webhook_errors` - webhook verification and decoding failures

mod aggregate;
mod errors;
mod gateway_event;
mod payment;
mod revenue;
mod status;
mod webhook_errors;

pub use aggregate::{PaymentOutcome, Subscription};
pub use errors::SubscriptionError;
pub use gateway_event::{Correlation, GatewayEvent, GatewayEventKind, DEFAULT_BILLING_PERIOD_DAYS};
pub use payment::{PaymentStatus, SubscriptionPayment};
pub use revenue::{
    dense_series, CreatorRanking, DateRange, RevenueBucketing, RevenuePoint, MONTHLY_THRESHOLD_DAYS,
};
pub use status::SubscriptionStatus;
pub use webhook_errors::WebhookError;
