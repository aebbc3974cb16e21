//! Subscriber notification port.
//!
//! Notifications are fire-and-forget: callers log failures and move on.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// First successful payment activated the subscription.
    Confirmed,
    /// The subscription was canceled by the subscriber or the gateway.
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionNotification {
    pub kind: NotificationKind,
    pub recipient_email: String,
    pub creator_name: String,
}

#[async_trait]
pub trait SubscriptionNotifier: Send + Sync {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<(), DomainError>;
}
