//! Transactional email settings (Resend).
//!
//! The whole section is optional. Without it subscription notifications
//! go to the log only.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// `re_...`
    pub resend_api_key: SecretString,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Override for the Resend API root, e.g. a local stub.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl EmailConfig {
    /// Sender as `Name <address>`.
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.resend_api_key.expose_secret();
        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("EMAIL__RESEND_API_KEY"));
        }
        if !api_key.starts_with("re_") {
            return Err(ValidationError::InvalidResendKey);
        }
        match self.from_email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ValidationError::InvalidFromEmail),
        }
    }
}

fn default_from_email() -> String {
    "noreply@creator-subscriptions.app".to_string()
}

fn default_from_name() -> String {
    "Creator Subscriptions".to_string()
}
