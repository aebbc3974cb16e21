//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, get_my_revenue, get_revenue, get_subscription, get_top_creators,
    handle_payment_webhook, health, list_subscriptions, start_checkout, SubscriptionAppState,
};

/// Subscriber routes, mounted at `/api/subscriptions`.
///
/// - `POST /checkout` - Start a checkout for a creator
/// - `GET /` - List own subscriptions
/// - `GET /:id` - Subscription detail with payments
/// - `POST /:id/cancel` - Cancel an active subscription
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", get(list_subscriptions))
        .route("/checkout", post(start_checkout))
        .route("/:id", get(get_subscription))
        .route("/:id/cancel", post(cancel_subscription))
}

/// Admin routes, mounted at `/api/admin`.
pub fn admin_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/revenue", get(get_revenue))
        .route("/creators/top", get(get_top_creators))
}

/// Creator self-service routes, mounted at `/api/creators`.
pub fn creator_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/me/revenue", get(get_my_revenue))
}

/// Gateway webhook routes, mounted at `/webhooks`.
///
/// No caller identity here; deliveries are authenticated by signature.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/payments", post(handle_payment_webhook))
}

/// The complete subscription router, plus the liveness probe.
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .nest("/api/subscriptions", subscription_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/creators", creator_routes())
        .nest("/webhooks", webhook_routes())
        .route("/health", get(health))
}
