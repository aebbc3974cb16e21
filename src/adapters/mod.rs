//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the subscription core to external systems:
//! - `http` - axum REST surface and the gateway webhook endpoint
//! - `memory` - mutex-guarded store for tests and local runs
//! - `notification` - subscriber emails
//! - `postgres` - sqlx persistence
//! - `stripe` - payment gateway client and webhook decoder

pub mod http;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod stripe;
