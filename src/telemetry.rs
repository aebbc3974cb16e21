//! Tracing setup and per-request spans.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{subscriber::set_global_default, Span, Subscriber};
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};
use uuid::Uuid;

/// Builds the process subscriber.
///
/// `RUST_LOG` wins over `default_env_filter`. JSON lines when `json` is
/// set, human-readable output otherwise.
pub fn get_subscriber<Sink>(
    default_env_filter: &str,
    json: bool,
    sink: Sink,
) -> Box<dyn Subscriber + Send + Sync>
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_env_filter));
    let registry = Registry::default().with(env_filter);

    if json {
        Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(sink),
            ),
        )
    } else {
        Box::new(registry.with(tracing_subscriber::fmt::layer().compact().with_writer(sink)))
    }
}

pub fn init_subscriber(
    subscriber: Box<dyn Subscriber + Send + Sync>,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    set_global_default(subscriber)
}

/// Generates a v4 UUID `x-request-id` for requests that arrive without one.
#[derive(Clone)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId> {
        match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(value) => Some(RequestId::new(value)),
            Err(e) => {
                tracing::warn!("Failed to create request id header value: {e:?}");
                None
            }
        }
    }
}

/// Root span of a request; every log line inside carries its request id.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok());

    tracing::info_span!(
        "request",
        request_id = request_id,
        method = %request.method(),
        path = request.uri().path(),
    )
}
