//! Email bodies for subscription notifications.

use crate::ports::{NotificationKind, SubscriptionNotification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn render(notification: &SubscriptionNotification) -> RenderedEmail {
    let creator = escape(&notification.creator_name);
    match notification.kind {
        NotificationKind::Confirmed => RenderedEmail {
            subject: format!("Your subscription to {} is active", notification.creator_name),
            html: format!(
                "<h1>Subscription confirmed</h1>\
                 <p>Your subscription to <strong>{}</strong> is now active and gives you \
                 access to all of their exclusive content.</p>\
                 <p>It renews automatically every month until you cancel it.</p>",
                creator
            ),
        },
        NotificationKind::Canceled => RenderedEmail {
            subject: format!("Your subscription to {} was canceled", notification.creator_name),
            html: format!(
                "<h1>Subscription canceled</h1>\
                 <p>Your subscription to <strong>{}</strong> has been canceled. \
                 You will not be charged again.</p>",
                creator
            ),
        },
    }
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            c => c.to_string(),
        })
        .collect()
}
