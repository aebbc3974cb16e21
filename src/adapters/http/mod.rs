//! HTTP adapters - REST API implementations.

pub mod subscription;

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::telemetry::{request_span, RequestUuid};

pub use subscription::{subscription_router, SubscriptionAppState};

/// Builds the service router with request ids, tracing and a request timeout.
///
/// Every request gets an `x-request-id` (generated unless the caller sent
/// one), recorded on its span and echoed on the response.
pub fn app(state: SubscriptionAppState, request_timeout: Duration) -> Router {
    subscription_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(RequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(request_timeout)),
    )
}
