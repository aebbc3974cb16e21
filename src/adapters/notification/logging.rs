use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{SubscriptionNotification, SubscriptionNotifier};

use super::templates::render;

/// Logs each notification instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl SubscriptionNotifier for LoggingNotifier {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<(), DomainError> {
        let email = render(&notification);
        tracing::info!(
            kind = ?notification.kind,
            recipient = %notification.recipient_email,
            subject = %email.subject,
            "Email delivery disabled, notification logged"
        );
        Ok(())
    }
}
