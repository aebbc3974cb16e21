//! Process wiring: configuration to adapters to the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::adapters::http::{app, SubscriptionAppState};
use crate::adapters::notification::{LoggingNotifier, ResendConfig, ResendEmailNotifier};
use crate::adapters::postgres::{
    PostgresRevenueReader, PostgresSubscriptionRepository, PostgresUserDirectory,
};
use crate::adapters::stripe::{StripeConfig, StripePaymentGateway, StripeWebhookDecoder};
use crate::application::handlers::subscription::{
    CheckoutSettings, PurgeAbandonedCheckoutsHandler,
};
use crate::config::{AppConfig, ConfigError};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{GatewayError, SubscriptionNotifier, SubscriptionRepository};

/// How often abandoned checkouts are swept while the server runs.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Payment gateway client: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Email client: {0}")]
    Notifier(#[from] DomainError),

    #[error("Purging abandoned checkouts failed: {0}")]
    Purge(#[from] SubscriptionError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checkout parameters derived from the payment section.
pub fn checkout_settings(config: &AppConfig) -> CheckoutSettings {
    CheckoutSettings {
        price_ref: config.payment.price_id.clone(),
        success_url: config.payment.success_url.clone(),
        cancel_url: config.payment.cancel_url.clone(),
        gateway_timeout: config.payment.gateway_timeout(),
        checkout_expiry_hours: config.payment.checkout_expiry_hours,
    }
}

/// Builds the adapters behind every port.
pub fn build_state(config: &AppConfig, pool: PgPool) -> Result<SubscriptionAppState, StartupError> {
    let mut stripe = StripeConfig::new(config.payment.stripe_api_key.clone())
        .with_request_timeout(config.payment.gateway_timeout());
    if let Some(base_url) = &config.payment.api_base_url {
        stripe = stripe.with_base_url(base_url.clone());
    }
    let payment_gateway = Arc::new(StripePaymentGateway::new(stripe)?);

    let webhook_decoder = Arc::new(
        StripeWebhookDecoder::new(config.payment.stripe_webhook_secret.clone())
            .with_tolerance_secs(config.payment.webhook_tolerance_secs)
            .with_require_livemode(config.payment.require_livemode),
    );

    let notifier: Arc<dyn SubscriptionNotifier> = match &config.email {
        Some(email) => {
            let mut resend = ResendConfig::new(email.resend_api_key.clone(), email.from_header());
            if let Some(base_url) = &email.api_base_url {
                resend = resend.with_base_url(base_url.clone());
            }
            Arc::new(ResendEmailNotifier::new(resend)?)
        }
        None => {
            tracing::warn!("No email configuration, subscription notifications will only be logged");
            Arc::new(LoggingNotifier)
        }
    };

    Ok(SubscriptionAppState {
        subscription_repository: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        revenue_reader: Arc::new(PostgresRevenueReader::new(pool.clone())),
        user_directory: Arc::new(PostgresUserDirectory::new(pool)),
        payment_gateway,
        webhook_decoder,
        notifier,
        checkout: checkout_settings(config),
    })
}

/// Sweeps abandoned checkouts on a fixed interval until the process exits.
pub fn spawn_purge_task(repository: Arc<dyn SubscriptionRepository>, checkout_expiry_hours: i64) {
    let handler = PurgeAbandonedCheckoutsHandler::new(repository, checkout_expiry_hours);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        // First tick fires immediately; startup already purged.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = handler.handle(Timestamp::now()).await {
                tracing::warn!(error = %e, "Periodic checkout purge failed");
            }
        }
    });
}

/// Connects, migrates, purges stale checkouts and serves until ctrl-c.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    config.validate().map_err(ConfigError::from)?;

    let connect_options = config.database.connect_options().map_err(ConfigError::from)?;
    let pool = config
        .database
        .pool_options()
        .connect_with(connect_options)
        .await?;
    tracing::info!("Postgres connection has been established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let state = build_state(&config, pool)?;

    let expiry_hours = config.payment.checkout_expiry_hours;
    PurgeAbandonedCheckoutsHandler::new(state.subscription_repository.clone(), expiry_hours)
        .handle(Timestamp::now())
        .await?;
    spawn_purge_task(state.subscription_repository.clone(), expiry_hours);

    let addr = config.server.socket_addr().map_err(ConfigError::from)?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = %config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "Server is listening"
    );

    axum::serve(listener, app(state, config.server.request_timeout()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received ctrl-c, shutting down");
}
