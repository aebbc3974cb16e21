//! HTTP adapter for subscription endpoints.
//!
//! - `POST /api/subscriptions/checkout` - Start a checkout for a creator
//! - `GET /api/subscriptions` - List own subscriptions
//! - `GET /api/subscriptions/:id` - Subscription detail with payments
//! - `POST /api/subscriptions/:id/cancel` - Cancel a subscription
//! - `GET /api/admin/revenue` - Revenue for a date range (admin)
//! - `GET /api/admin/creators/top` - Creators by active subscriptions (admin)
//! - `GET /api/creators/me/revenue` - Own revenue (content creator)
//! - `POST /webhooks/payments` - Gateway webhooks
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    AuthenticatedUser, SubscriptionApiError, SubscriptionAppState, SIGNATURE_HEADER,
    USER_ID_HEADER,
};
pub use routes::subscription_router;
