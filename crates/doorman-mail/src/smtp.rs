//! SMTP mailer backed by lettre

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::MailError;
use crate::Mailer;

/// SMTP connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
    /// Use STARTTLS instead of implicit TLS
    #[serde(default)]
    pub starttls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

/// Mailer sending through an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)?
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!("SMTP mailer configured for {}:{}", config.server, config.port);

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }

    /// Subject and body for the reset mail, by language tag
    fn reset_template(to: &str, reset_url: &str, language: &str) -> (String, String) {
        let name = to.split('@').next().unwrap_or(to);
        match language {
            "it" => (
                "Reimposta la tua password".to_string(),
                format!(
                    "Ciao {},\n\nPer reimpostare la password apri questo link:\n{}\n\nIl link scade tra 1 ora.\nSe non hai richiesto tu la reimpostazione, ignora questa email.",
                    name, reset_url
                ),
            ),
            _ => (
                "Reset your password".to_string(),
                format!(
                    "Hi {},\n\nOpen this link to reset your password:\n{}\n\nThe link expires in 1 hour.\nIf you did not request a reset, ignore this email.",
                    name, reset_url
                ),
            ),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        reset_url: &str,
        language: &str,
    ) -> Result<(), MailError> {
        let (subject, body) = Self::reset_template(to, reset_url, language);

        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        debug!("Password reset mail sent to {}", to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_template_languages() {
        let (subject_it, body_it) =
            SmtpMailer::reset_template("mario@example.com", "https://app/reset?token=t", "it");
        assert!(subject_it.contains("password"));
        assert!(body_it.contains("mario"));
        assert!(body_it.contains("https://app/reset?token=t"));

        let (subject_en, body_en) =
            SmtpMailer::reset_template("mario@example.com", "https://app/reset?token=t", "en");
        assert_eq!(subject_en, "Reset your password");
        assert!(body_en.contains("1 hour"));
    }
}
