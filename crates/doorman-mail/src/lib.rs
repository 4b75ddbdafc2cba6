//! Doorman Mail
//!
//! Outbound mail delivery behind a small trait so the auth orchestrator
//! never depends on a concrete transport.

pub mod error;
pub mod smtp;

use async_trait::async_trait;
use tracing::warn;

pub use error::MailError;
pub use smtp::{SmtpConfig, SmtpMailer};

/// Outbound mail interface
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password-reset mail containing the given link
    async fn send_password_reset(
        &self,
        to: &str,
        reset_url: &str,
        language: &str,
    ) -> Result<(), MailError>;
}

/// Mailer used when no SMTP relay is configured
///
/// Logs the would-be delivery and reports success, which keeps the
/// forgot-password flow functional in development setups.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        _reset_url: &str,
        _language: &str,
    ) -> Result<(), MailError> {
        warn!("SMTP not configured, dropping password reset mail for {}", to);
        Ok(())
    }
}
