//! Mock payment gateway for testing.
//!
//! Configurable implementation of `PaymentGateway` for unit and integration
//! tests: error injection per method, artificial latency, and a call log
//! for asserting which gateway calls were (or were not) issued.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{
    CheckoutSession, CheckoutSessionRequest, CustomerRequest, GatewayError, PaymentGateway,
};

/// Mock payment gateway.
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.set_method_error("create_checkout_session", GatewayError::network("down"));
/// // ... exercise the handler ...
/// assert!(!gateway.was_called("cancel_remote_subscription"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Customer ids the "gateway" knows about.
    customers: HashSet<String>,

    /// Remote subscriptions that were canceled.
    canceled: Vec<String>,

    /// Checkout sessions that were expired.
    expired: Vec<String>,

    /// Errors returned by a specific method until cleared.
    method_errors: HashMap<String, GatewayError>,

    /// Latency added before every call.
    delay: Option<Duration>,

    next_session: u64,

    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a customer id as existing at the gateway.
    pub fn add_customer(&self, customer_id: &str) {
        self.state().customers.insert(customer_id.to_string());
    }

    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    /// Delays every call, to exercise caller timeouts.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Remote subscription ids canceled so far.
    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.state().canceled.clone()
    }

    /// Checkout session ids expired so far.
    pub fn expired_sessions(&self) -> Vec<String> {
        self.state().expired.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), GatewayError> {
        let delay = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.state().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn get_or_create_customer(
        &self,
        request: CustomerRequest,
    ) -> Result<String, GatewayError> {
        self.enter(
            "get_or_create_customer",
            vec![
                request.user_id.to_string(),
                request.existing_customer_id.clone().unwrap_or_default(),
            ],
        )
        .await?;

        let mut state = self.state();
        if let Some(existing) = request.existing_customer_id {
            if state.customers.contains(&existing) {
                return Ok(existing);
            }
        }
        let id = format!("cus_mock_{}", request.user_id.as_uuid().simple());
        state.customers.insert(id.clone());
        Ok(id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.enter(
            "create_checkout_session",
            vec![
                request.customer_id.clone(),
                request.price_ref.clone(),
                request.correlation.creator_id.to_string(),
                request.correlation.subscription_id.to_string(),
            ],
        )
        .await?;

        let mut state = self.state();
        state.next_session += 1;
        let session_id = format!("cs_mock_{}", state.next_session);
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.example.test/{}", session_id),
            session_id,
            expires_at: None,
        })
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), GatewayError> {
        self.enter("expire_checkout_session", vec![session_id.to_string()])
            .await?;

        self.state().expired.push(session_id.to_string());
        Ok(())
    }

    async fn cancel_remote_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<(), GatewayError> {
        self.enter(
            "cancel_remote_subscription",
            vec![external_subscription_id.to_string()],
        )
        .await?;

        self.state()
            .canceled
            .push(external_subscription_id.to_string());
        Ok(())
    }
}
