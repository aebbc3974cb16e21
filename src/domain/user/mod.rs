//! Platform users as seen by the subscription core.
//!
//! Users are owned by the account service; this crate only reads them and
//! remembers their payment gateway customer id.

mod account;

pub use account::{UserAccount, UserRole};
