//! Outgoing mail
//!
//! `Mailer` is the transport seam used by the notification listener.
//! `SmtpMailer` delivers through an SMTP relay with lettre; `LogMailer`
//! only logs, and is used when no SMTP host is configured.

use crate::config::MailConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Error types for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Failed to create SMTP transport: {0}")]
    Transport(String),

    #[error("Failed to send email: {0}")]
    Send(String),

    #[error("Failed to render email: {0}")]
    Template(String),
}

/// Mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Delivers mail through an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, config: &MailConfig) -> Result<Self, MailError> {
        let from = mailbox(&config.from_name, &config.from_address)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&mail.to_name, &mail.to_email)?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        Ok(())
    }
}

/// Writes mail to the log instead of sending it
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to_email,
            subject = %mail.subject,
            "Mail delivery disabled, logging message:\n{}",
            mail.body
        );
        Ok(())
    }
}

/// SMTP mailer when a host is configured, log mailer otherwise
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, config)?)),
        None => {
            tracing::warn!("No SMTP host configured, notifications will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn mailbox(name: &str, email: &str) -> Result<Mailbox, MailError> {
    let address: Address = email
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to_string()))?;
    let name = Some(name.to_string()).filter(|n| !n.trim().is_empty());
    Ok(Mailbox::new(name, address))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_with_name() {
        let mb = mailbox("Ada Lovelace", "ada@example.com").unwrap();
        assert_eq!(mb.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(mb.email.to_string(), "ada@example.com");
    }

    #[test]
    fn test_mailbox_without_name() {
        let mb = mailbox("  ", "ada@example.com").unwrap();
        assert!(mb.name.is_none());
    }

    #[test]
    fn test_mailbox_invalid_address() {
        assert!(matches!(
            mailbox("Ada", "not-an-address"),
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_mail() {
        let mail = OutgoingMail {
            to_name: "Ada".to_string(),
            to_email: "ada@example.com".to_string(),
            subject: "New Post!".to_string(),
            body: "Hello".to_string(),
        };
        assert!(LogMailer.send(&mail).await.is_ok());
    }

    #[test]
    fn test_mailer_from_config_without_host() {
        assert!(mailer_from_config(&MailConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_mailer_from_config_with_host() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_username: Some("user".to_string()),
            smtp_password: Some("secret".to_string()),
            ..MailConfig::default()
        };
        assert!(mailer_from_config(&config).is_ok());
    }
}
