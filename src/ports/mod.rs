//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the subscription core and the outside world. Adapters implement them.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Subscriptions and their payment ledger
//! - `RevenueReader` - Read-only revenue projections over the ledger
//!
//! ## Collaborator Ports
//!
//! - `PaymentGateway` - Customers, checkout sessions, remote cancellation
//! - `WebhookDecoder` - Signature check and translation of gateway webhooks
//! - `UserDirectory` - User lookup and gateway customer id storage
//! - `SubscriptionNotifier` - Fire-and-forget subscriber notifications

mod notifier;
mod payment_gateway;
mod revenue_reader;
mod subscription_repository;
mod user_directory;
mod webhook_decoder;

pub use notifier::{NotificationKind, SubscriptionNotification, SubscriptionNotifier};
pub use payment_gateway::{
    CheckoutCorrelation, CheckoutSession, CheckoutSessionRequest, CustomerRequest, GatewayError,
    GatewayErrorCode, PaymentGateway,
};
pub use revenue_reader::RevenueReader;
pub use subscription_repository::{CommitOutcome, SubscriptionRepository};
pub use user_directory::UserDirectory;
pub use webhook_decoder::WebhookDecoder;
