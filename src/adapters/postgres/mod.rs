//! PostgreSQL adapters.
//!
//! - `PostgresSubscriptionRepository` - subscriptions and the payment ledger
//! - `PostgresRevenueReader` - revenue aggregations over the ledger
//! - `PostgresUserDirectory` - user lookups and gateway customer ids
//!
//! Schema lives in `migrations/` and is applied at startup.

mod revenue_reader;
mod subscription_repository;
mod user_directory;

pub use revenue_reader::PostgresRevenueReader;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_directory::PostgresUserDirectory;
