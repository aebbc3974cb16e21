//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | Forbidden | 403 |
//! | NotFound, UserNotFound | 404 |
//! | Conflict, InvalidState | 409 |
//! | Upstream | 500 |
//! | Contention, Infrastructure | 500 |
//! | OrphanEvent | 200 (webhook only) |

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId, ValidationError};

/// Errors surfaced by the subscription use cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// No subscription with this id, or not in the status the operation needs.
    NotFound(SubscriptionId),

    /// Referenced user does not exist.
    UserNotFound(UserId),

    /// The pair already has a Pending or Active subscription.
    Conflict {
        subscriber_id: UserId,
        creator_id: UserId,
    },

    /// Caller may not act on this resource.
    Forbidden(String),

    /// The payment gateway failed, timed out or rejected the call.
    Upstream { operation: String, reason: String },

    /// Gateway event matches no local subscription.
    OrphanEvent {
        external_event_id: String,
        external_subscription_id: String,
    },

    /// Concurrent writers kept winning the race on this row.
    Contention(SubscriptionId),

    /// Operation not allowed in the current state.
    InvalidState { current: String, attempted: String },

    ValidationFailed { field: String, message: String },

    Infrastructure(String),
}

impl SubscriptionError {
    pub fn not_found(id: SubscriptionId) -> Self {
        SubscriptionError::NotFound(id)
    }

    pub fn user_not_found(id: UserId) -> Self {
        SubscriptionError::UserNotFound(id)
    }

    pub fn conflict(subscriber_id: UserId, creator_id: UserId) -> Self {
        SubscriptionError::Conflict {
            subscriber_id,
            creator_id,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        SubscriptionError::Forbidden(reason.into())
    }

    pub fn upstream(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        SubscriptionError::Upstream {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn orphan_event(
        external_event_id: impl Into<String>,
        external_subscription_id: impl Into<String>,
    ) -> Self {
        SubscriptionError::OrphanEvent {
            external_event_id: external_event_id.into(),
            external_subscription_id: external_subscription_id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) | SubscriptionError::OrphanEvent { .. } => {
                ErrorCode::SubscriptionNotFound
            }
            SubscriptionError::UserNotFound(_) => ErrorCode::UserNotFound,
            SubscriptionError::Conflict { .. } => ErrorCode::DuplicateSubscription,
            SubscriptionError::Forbidden(_) => ErrorCode::Forbidden,
            SubscriptionError::Upstream { .. } => ErrorCode::PaymentProviderError,
            SubscriptionError::Contention(_) => ErrorCode::ConcurrencyConflict,
            SubscriptionError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFound(id) => format!("Subscription not found: {}", id),
            SubscriptionError::UserNotFound(id) => format!("User not found: {}", id),
            SubscriptionError::Conflict { creator_id, .. } => {
                format!("Already subscribed to creator {}", creator_id)
            }
            SubscriptionError::Forbidden(reason) => reason.clone(),
            SubscriptionError::Upstream { operation, reason } => {
                format!("Payment provider failed during {}: {}", operation, reason)
            }
            SubscriptionError::OrphanEvent {
                external_event_id,
                external_subscription_id,
            } => format!(
                "Event {} references unknown subscription {}",
                external_event_id, external_subscription_id
            ),
            SubscriptionError::Contention(id) => {
                format!("Subscription {} is being modified concurrently", id)
            }
            SubscriptionError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Transient failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::Upstream { .. }
                | SubscriptionError::Contention(_)
                | SubscriptionError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => {
                SubscriptionError::ValidationFailed {
                    field: err
                        .details
                        .get("field")
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: err.message,
                }
            }
            ErrorCode::InvalidStateTransition => SubscriptionError::InvalidState {
                current: err
                    .details
                    .get("status")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                attempted: err.message,
            },
            ErrorCode::Forbidden => SubscriptionError::Forbidden(err.message),
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        DomainError::from(err).into()
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
