//! Subscriber notification adapters.
//!
//! - `ResendEmailNotifier` - transactional email through the Resend API
//! - `LoggingNotifier` - writes notifications to the log, for local runs

mod logging;
mod resend;
mod templates;

pub use logging::LoggingNotifier;
pub use resend::{ResendConfig, ResendEmailNotifier};
pub use templates::{render, RenderedEmail};
