//! In-memory adapters.
//!
//! A single mutex-guarded store implementing the persistence and user
//! ports with the same atomicity as the Postgres adapters. Used by tests
//! and for running the service without a database.

mod store;

pub use store::InMemoryStore;
