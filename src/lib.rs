//! Creator Subscriptions - Subscription lifecycle core for a content platform
//!
//! Subscribers pay content creators a recurring fee through an external
//! payment gateway. This crate owns the subscription state machine, the
//! payment ledger, reconciliation of asynchronous gateway events, and the
//! revenue projections built from the ledger.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod startup;
pub mod telemetry;
