//! Subscription command and query handlers.
//!
//! - Commands: start checkout, cancel, reconcile a gateway event, handle a
//!   webhook delivery, purge abandoned checkouts
//! - Queries: list, detail, revenue report, top creators

mod cancel_subscription;
mod get_subscription;
mod handle_gateway_webhook;
mod purge_abandoned_checkouts;
mod reconcile_gateway_event;
mod revenue;
mod start_checkout;
mod support;

pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use get_subscription::{
    GetSubscriptionHandler, GetSubscriptionQuery, ListSubscriptionsHandler,
    ListSubscriptionsQuery, SubscriptionDetail,
};
pub use handle_gateway_webhook::{HandleGatewayWebhookHandler, WebhookFailure, WebhookOutcome};
pub use purge_abandoned_checkouts::PurgeAbandonedCheckoutsHandler;
pub use reconcile_gateway_event::{ReconcileGatewayEventHandler, ReconcileOutcome, MAX_COMMIT_ATTEMPTS};
pub use revenue::{
    GetRevenueReportHandler, GetRevenueReportQuery, GetTopCreatorsHandler, GetTopCreatorsQuery,
    RevenueReport, DEFAULT_TOP_CREATORS_LIMIT, MAX_TOP_CREATORS_LIMIT,
};
pub use start_checkout::{
    CheckoutSettings, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
};
