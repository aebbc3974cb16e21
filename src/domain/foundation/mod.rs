//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps and the error types that the subscription
//! domain is expressed in.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{PaymentId, SubscriptionId, UserId};
pub use timestamp::Timestamp;
