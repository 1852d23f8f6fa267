/// Outbound mail. Callers log failures and carry on. Retries belong to
/// `QueuedMailer`, which wraps a single-attempt transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
