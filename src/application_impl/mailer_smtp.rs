use crate::domain_port::Mailer;
use anyhow::{Context, anyhow};
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::fmt;
use tracing::info;

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .field("starttls", &self.starttls)
            .finish_non_exhaustive()
    }
}

/// Plain-text mail over an SMTP relay. A single attempt per call; put it
/// behind `QueuedMailer` for retries.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid mail.smtp.from address: {}", config.from))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .context("failed to configure SMTP transport")?
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

fn build_message(from: &Mailbox, to: &str, subject: &str, body: &str) -> anyhow::Result<Message> {
    let to = to
        .parse::<Mailbox>()
        .map_err(|e| anyhow!("invalid recipient address: {e}"))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("failed to build mail message")
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = build_message(&self.from, to, subject, body)?;
        self.transport
            .send(message)
            .await
            .context("smtp send failed")?;
        info!(%to, %subject, "mail sent over smtp");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        "Token Authority <no-reply@example.com>".parse().unwrap()
    }

    #[test]
    fn message_carries_sender_recipient_and_subject() {
        let message = build_message(&sender(), "ada@example.com", "Email Verification", "code 123456")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.lines().any(|l| l.starts_with("From:") && l.contains("<no-reply@example.com>")));
        assert!(raw.lines().any(|l| l.starts_with("To:") && l.contains("ada@example.com")));
        assert!(raw.contains("Subject: Email Verification"));
        assert!(raw.contains("code 123456"));
    }

    #[test]
    fn bad_recipient_is_rejected_before_sending() {
        assert!(build_message(&sender(), "not an address", "s", "b").is_err());
    }

    #[test]
    fn bad_sender_fails_construction() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from: "nobody".to_string(),
            starttls: true,
        };
        assert!(SmtpMailer::new(&config).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("mailer".to_string()),
            password: Some("smtp-secret".to_string()),
            from: "no-reply@example.com".to_string(),
            starttls: true,
        };
        assert!(!format!("{config:?}").contains("smtp-secret"));
    }
}
