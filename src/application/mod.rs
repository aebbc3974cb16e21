//! Application layer - use cases orchestrating the domain and ports.

pub mod handlers;
