//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to the subscription command and
//! query handlers.

use std::sync::Arc;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Json, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::handlers::subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CheckoutSettings,
    GetRevenueReportHandler, GetRevenueReportQuery, GetSubscriptionHandler, GetSubscriptionQuery,
    GetTopCreatorsHandler, GetTopCreatorsQuery, HandleGatewayWebhookHandler,
    ListSubscriptionsHandler, ListSubscriptionsQuery, ReconcileGatewayEventHandler,
    StartCheckoutCommand, StartCheckoutHandler, WebhookFailure,
};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::SubscriptionError;
use crate::domain::user::{UserAccount, UserRole};
use crate::ports::{
    PaymentGateway, RevenueReader, SubscriptionNotifier, SubscriptionRepository, UserDirectory,
    WebhookDecoder,
};

use super::dto::{
    CheckoutResponse, ErrorResponse, HealthResponse, RevenueRangeParams, RevenueResponse,
    StartCheckoutRequest, SubscriptionDetailResponse, SubscriptionListResponse,
    SubscriptionResponse, TopCreatorResponse, TopCreatorsParams, TopCreatorsResponse,
    WebhookAckResponse,
};

/// Header carrying the caller's identity, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the gateway's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; handlers are built on demand from the
/// Arc-wrapped ports.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub revenue_reader: Arc<dyn RevenueReader>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub webhook_decoder: Arc<dyn WebhookDecoder>,
    pub notifier: Arc<dyn SubscriptionNotifier>,
    pub checkout: CheckoutSettings,
}

impl SubscriptionAppState {
    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.subscription_repository.clone(),
            self.user_directory.clone(),
            self.payment_gateway.clone(),
            self.checkout.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscription_repository.clone(),
            self.payment_gateway.clone(),
            self.user_directory.clone(),
            self.notifier.clone(),
            self.checkout.gateway_timeout,
        )
    }

    pub fn list_subscriptions_handler(&self) -> ListSubscriptionsHandler {
        ListSubscriptionsHandler::new(self.subscription_repository.clone())
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.subscription_repository.clone())
    }

    pub fn revenue_report_handler(&self) -> GetRevenueReportHandler {
        GetRevenueReportHandler::new(self.revenue_reader.clone())
    }

    pub fn top_creators_handler(&self) -> GetTopCreatorsHandler {
        GetTopCreatorsHandler::new(self.revenue_reader.clone())
    }

    pub fn webhook_handler(&self) -> HandleGatewayWebhookHandler {
        let reconciler = ReconcileGatewayEventHandler::new(
            self.subscription_repository.clone(),
            self.user_directory.clone(),
            self.notifier.clone(),
        );
        HandleGatewayWebhookHandler::new(self.webhook_decoder.clone(), Arc::new(reconciler))
    }

    /// Loads the caller and checks their role.
    async fn require_role(
        &self,
        user: &AuthenticatedUser,
        role: UserRole,
    ) -> Result<UserAccount, SubscriptionApiError> {
        let account = self
            .user_directory
            .find_user(&user.user_id)
            .await?
            .filter(|account| account.role == role);
        match account {
            Some(account) => Ok(account),
            None => {
                tracing::warn!(user_id = %user.user_id, required = %role, "Role check failed");
                Err(SubscriptionError::forbidden(format!("{} role required", role)).into())
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity extracted from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<UserId>().ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, SubscriptionApiError> {
    raw.parse::<SubscriptionId>()
        .map_err(|_| SubscriptionError::validation("id", "Subscription id must be a UUID").into())
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriber Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions/checkout - Start a checkout for a creator
pub async fn start_checkout(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.start_checkout_handler();
    let cmd = StartCheckoutCommand {
        subscriber_id: user.user_id,
        creator_id: request.creator_id,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// GET /api/subscriptions - List the caller's subscriptions, newest first
pub async fn list_subscriptions(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.list_subscriptions_handler();
    let query = ListSubscriptionsQuery {
        subscriber_id: user.user_id,
    };

    let subscriptions = handler.handle(query).await?;

    Ok(Json(SubscriptionListResponse {
        subscriptions: subscriptions
            .into_iter()
            .map(SubscriptionResponse::from)
            .collect(),
    }))
}

/// GET /api/subscriptions/:id - One subscription with its payments
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.get_subscription_handler();
    let query = GetSubscriptionQuery {
        subscriber_id: user.user_id,
        subscription_id: parse_subscription_id(&id)?,
    };

    let detail = handler.handle(query).await?;

    Ok(Json(SubscriptionDetailResponse::from(detail)))
}

/// POST /api/subscriptions/:id/cancel - Cancel an active subscription
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.cancel_subscription_handler();
    let cmd = CancelSubscriptionCommand {
        subscriber_id: user.user_id,
        subscription_id: parse_subscription_id(&id)?,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Revenue Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/admin/revenue - Platform revenue for a date range (admin only)
pub async fn get_revenue(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Query(params): Query<RevenueRangeParams>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    state.require_role(&user, UserRole::Admin).await?;

    let report = state
        .revenue_report_handler()
        .handle(GetRevenueReportQuery {
            start_date: params.start_date,
            end_date: params.end_date,
            creator_id: None,
        })
        .await?;

    Ok(Json(RevenueResponse::from(report)))
}

/// GET /api/admin/creators/top - Creators ranked by active subscriptions (admin only)
pub async fn get_top_creators(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Query(params): Query<TopCreatorsParams>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    state.require_role(&user, UserRole::Admin).await?;

    let creators = state
        .top_creators_handler()
        .handle(GetTopCreatorsQuery {
            limit: params.limit,
        })
        .await?;

    Ok(Json(TopCreatorsResponse {
        creators: creators.into_iter().map(TopCreatorResponse::from).collect(),
    }))
}

/// GET /api/creators/me/revenue - The calling creator's own revenue
pub async fn get_my_revenue(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Query(params): Query<RevenueRangeParams>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let creator = state.require_role(&user, UserRole::ContentCreator).await?;

    let report = state
        .revenue_report_handler()
        .handle(GetRevenueReportQuery {
            start_date: params.start_date,
            end_date: params.end_date,
            creator_id: Some(creator.id),
        })
        .await?;

    Ok(Json(RevenueResponse::from(report)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Gateway Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payments - Signed lifecycle events from the payment gateway
///
/// Every acknowledged outcome is a 200, including replays and orphans.
/// Anything the gateway should retry is a 5xx.
pub async fn handle_payment_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.webhook_handler().handle(&body, signature).await {
        Ok(outcome) => (StatusCode::OK, Json(WebhookAckResponse::from(outcome))).into_response(),
        Err(WebhookFailure::Rejected(err)) => {
            let body = ErrorResponse::new("WEBHOOK_REJECTED", err.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Err(WebhookFailure::Failed(err)) => SubscriptionApiError::from(err).into_response(),
    }
}

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts subscription errors to HTTP responses.
#[derive(Debug)]
pub struct SubscriptionApiError(SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for SubscriptionApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SubscriptionError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            SubscriptionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SubscriptionError::NotFound(_)
            | SubscriptionError::UserNotFound(_)
            | SubscriptionError::OrphanEvent { .. } => StatusCode::NOT_FOUND,
            SubscriptionError::Conflict { .. } | SubscriptionError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            SubscriptionError::Upstream { .. }
            | SubscriptionError::Contention(_)
            | SubscriptionError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the logs; the request id ties them together.
        let message = match &self.0 {
            SubscriptionError::Upstream { .. } => "Payment provider unavailable".to_string(),
            SubscriptionError::Infrastructure(_) => "Internal error".to_string(),
            other => other.message(),
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = %self.0.code(), "Request failed");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), message);
        (status, Json(body)).into_response()
    }
}
