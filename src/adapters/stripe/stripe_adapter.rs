//! Stripe implementation of the `PaymentGateway` port.
//!
//! Talks to the Stripe REST API with form-encoded requests and basic auth.
//! Every request is bounded by the client timeout in [`StripeConfig`].
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_request_timeout(Duration::from_secs(10));
//! let gateway = StripePaymentGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutSession, CheckoutSessionRequest, CustomerRequest, GatewayError, GatewayErrorCode,
    PaymentGateway,
};

use super::webhook_types::{
    StripeCheckoutSession, StripeCustomer, CREATOR_ID_KEY, SUBSCRIBER_ID_KEY, SUBSCRIPTION_ID_KEY,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,
    api_base_url: String,
    request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Custom API base URL, for stubs and proxies.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct StripePaymentGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

/// Stripe's error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::new(GatewayErrorCode::ProviderError, e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    /// Sends the request and decodes a 2xx body, mapping everything else.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = response_error(status.as_u16(), &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                provider_code = err.provider_code.as_deref().unwrap_or(""),
                "Stripe API call failed"
            );
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            GatewayError::new(
                GatewayErrorCode::ProviderError,
                format!("Failed to parse Stripe response for {}: {}", operation, e),
            )
        })
    }

    async fn find_live_customer(&self, customer_id: &str) -> Result<Option<String>, GatewayError> {
        let request = self
            .http_client
            .get(self.url(&format!("/v1/customers/{}", customer_id)));
        match self.send::<StripeCustomer>("get_customer", request).await {
            Ok(customer) if customer.deleted => Ok(None),
            Ok(customer) => Ok(Some(customer.id)),
            Err(err) if err.code == GatewayErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn get_or_create_customer(
        &self,
        request: CustomerRequest,
    ) -> Result<String, GatewayError> {
        if let Some(existing) = &request.existing_customer_id {
            if let Some(live) = self.find_live_customer(existing).await? {
                return Ok(live);
            }
            tracing::info!(
                user_id = %request.user_id,
                customer_id = %existing,
                "Stored Stripe customer is gone, creating a new one"
            );
        }

        let params = [
            ("email", request.email.clone()),
            ("name", request.name.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        let customer: StripeCustomer = self
            .send(
                "create_customer",
                self.http_client.post(self.url("/v1/customers")).form(&params),
            )
            .await?;
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let params = checkout_params(&request);
        let session: StripeCheckoutSession = self
            .send(
                "create_checkout_session",
                self.http_client
                    .post(self.url("/v1/checkout/sessions"))
                    .form(&params),
            )
            .await?;

        let redirect_url = session.url.ok_or_else(|| {
            GatewayError::new(
                GatewayErrorCode::ProviderError,
                "Checkout session has no redirect URL",
            )
        })?;
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url,
            expires_at: session.expires_at.and_then(Timestamp::from_unix_secs),
        })
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/checkout/sessions/{}/expire", session_id)));
        let _: serde_json::Value = self.send("expire_checkout_session", request).await?;
        Ok(())
    }

    async fn cancel_remote_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<(), GatewayError> {
        let request = self
            .http_client
            .delete(self.url(&format!("/v1/subscriptions/{}", external_subscription_id)))
            .form(&[("prorate", "false")]);
        let _: serde_json::Value = self.send("cancel_subscription", request).await?;
        Ok(())
    }
}

/// Form fields for a subscription-mode checkout session.
///
/// The subscriber/creator pair is written both on the session and on the
/// subscription it creates, so invoice events carry it back.
fn checkout_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let correlation = request.correlation;
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("line_items[0][price]".to_string(), request.price_ref.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), correlation.creator_id.to_string()),
    ];
    let metadata = [
        (SUBSCRIBER_ID_KEY, correlation.subscriber_id.to_string()),
        (CREATOR_ID_KEY, correlation.creator_id.to_string()),
        (SUBSCRIPTION_ID_KEY, correlation.subscription_id.to_string()),
    ];
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
        params.push((format!("subscription_data[metadata][{}]", key), value));
    }
    params
}

fn transport_error(operation: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout(operation)
    } else {
        GatewayError::network(err.to_string())
    }
}

fn response_error(status: u16, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe API returned status {}", status));
    let code = match status {
        401 | 403 => GatewayErrorCode::AuthenticationError,
        404 => GatewayErrorCode::NotFound,
        429 => GatewayErrorCode::RateLimitExceeded,
        400..=499 => GatewayErrorCode::InvalidRequest,
        _ => GatewayErrorCode::ProviderError,
    };
    let err = GatewayError::new(code, message);
    match detail.and_then(|d| d.code) {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SubscriptionId, UserId};
    use crate::ports::CheckoutCorrelation;

    fn config() -> StripeConfig {
        StripeConfig::new(SecretString::new("sk_test_key".to_string()))
    }

    #[test]
    fn config_defaults() {
        let config = config();
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_overrides() {
        let config = config()
            .with_base_url("http://localhost:12111")
            .with_request_timeout(Duration::from_millis(500));
        assert_eq!(config.api_base_url, "http://localhost:12111");
        assert_eq!(config.request_timeout, Duration::from_millis(500));
    }

    #[test]
    fn checkout_params_carry_correlation_on_session_and_subscription() {
        let correlation = CheckoutCorrelation {
            subscription_id: SubscriptionId::new(),
            subscriber_id: UserId::new(),
            creator_id: UserId::new(),
        };
        let params = checkout_params(&CheckoutSessionRequest {
            customer_id: "cus_1".to_string(),
            price_ref: "price_1".to_string(),
            success_url: "https://app.test/ok?creator=painter".to_string(),
            cancel_url: "https://app.test/ko?creator=painter".to_string(),
            correlation,
        });
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_1"));
        assert_eq!(
            get("client_reference_id"),
            Some(correlation.creator_id.to_string().as_str())
        );
        assert_eq!(
            get("subscription_data[metadata][subscriber_id]"),
            Some(correlation.subscriber_id.to_string().as_str())
        );
        assert_eq!(
            get("metadata[subscription_id]"),
            Some(correlation.subscription_id.to_string().as_str())
        );
    }

    #[test]
    fn error_body_supplies_message_and_provider_code() {
        let err = response_error(
            402,
            r#"{"error":{"code":"card_declined","message":"Your card was declined."}}"#,
        );
        assert_eq!(err.code, GatewayErrorCode::InvalidRequest);
        assert_eq!(err.message, "Your card was declined.");
        assert_eq!(err.provider_code.as_deref(), Some("card_declined"));
    }

    #[test]
    fn status_codes_map_to_error_codes() {
        assert_eq!(response_error(401, "").code, GatewayErrorCode::AuthenticationError);
        assert_eq!(response_error(404, "").code, GatewayErrorCode::NotFound);
        assert_eq!(response_error(429, "").code, GatewayErrorCode::RateLimitExceeded);
        assert_eq!(response_error(503, "not json").code, GatewayErrorCode::ProviderError);
        assert!(response_error(503, "").provider_code.is_none());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // HTTP Tests
    // ════════════════════════════════════════════════════════════════════════════

    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> StripePaymentGateway {
        StripePaymentGateway::new(config().with_base_url(server.uri())).unwrap()
    }

    fn customer_request(existing: Option<&str>) -> CustomerRequest {
        CustomerRequest {
            user_id: UserId::new(),
            email: "fan@example.com".to_string(),
            name: "fan".to_string(),
            existing_customer_id: existing.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn live_existing_customer_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus_live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cus_live"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cus_new"})))
            .expect(0)
            .mount(&server)
            .await;

        let id = gateway(&server)
            .get_or_create_customer(customer_request(Some("cus_live")))
            .await
            .unwrap();

        assert_eq!(id, "cus_live");
    }

    #[tokio::test]
    async fn deleted_customer_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus_old"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cus_old", "deleted": true})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(body_string_contains("email=fan%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cus_new"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = gateway(&server)
            .get_or_create_customer(customer_request(Some("cus_old")))
            .await
            .unwrap();

        assert_eq!(id, "cus_new");
    }

    #[tokio::test]
    async fn checkout_session_returns_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=subscription"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_1",
                "url": "https://checkout.stripe.com/c/pay/cs_1",
                "expires_at": 1_704_153_600
            })))
            .mount(&server)
            .await;

        let session = gateway(&server)
            .create_checkout_session(CheckoutSessionRequest {
                customer_id: "cus_1".to_string(),
                price_ref: "price_1".to_string(),
                success_url: "https://app.test/ok".to_string(),
                cancel_url: "https://app.test/ko".to_string(),
                correlation: CheckoutCorrelation {
                    subscription_id: SubscriptionId::new(),
                    subscriber_id: UserId::new(),
                    creator_id: UserId::new(),
                },
            })
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_1");
        assert_eq!(session.redirect_url, "https://checkout.stripe.com/c/pay/cs_1");
        assert_eq!(session.expires_at, Timestamp::from_unix_secs(1_704_153_600));
    }

    #[tokio::test]
    async fn cancel_deletes_without_proration() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/subscriptions/sub_1"))
            .and(body_string_contains("prorate=false"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "sub_1", "status": "canceled"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        gateway(&server).cancel_remote_subscription("sub_1").await.unwrap();
    }

    #[tokio::test]
    async fn expire_posts_to_session_expire_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions/cs_1/expire"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cs_1", "status": "expired"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        gateway(&server).expire_checkout_session("cs_1").await.unwrap();
    }

    #[tokio::test]
    async fn server_error_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .cancel_remote_subscription("sub_1")
            .await
            .unwrap_err();

        assert_eq!(err.code, GatewayErrorCode::ProviderError);
    }
}
