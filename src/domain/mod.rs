//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `subscription` - Subscription lifecycle, payment ledger and revenue projections
//! - `user` - Read model of platform users and their roles

pub mod foundation;
pub mod subscription;
pub mod user;
