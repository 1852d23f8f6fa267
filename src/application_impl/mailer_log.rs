use crate::domain_port::Mailer;
use tracing::{debug, info};

/// Mail backend for development: writes messages to the log instead of an SMTP relay.
#[derive(Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, "mail dispatched to log backend");
        debug!(%to, %body, "mail body (dev only)");
        Ok(())
    }
}
