use crate::domain_port::Mailer;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct MailRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl MailRetryPolicy {
    /// Backoff before the next try: doubles per failed attempt, capped.
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug)]
struct OutgoingMail {
    to: String,
    subject: String,
    body: String,
}

/// `Mailer` that only enqueues. A background worker delivers through the
/// wrapped transport and retries failed sends with exponential backoff.
pub struct QueuedMailer {
    tx: mpsc::Sender<OutgoingMail>,
}

impl QueuedMailer {
    /// Spawns the delivery worker. After `cancel` fires the worker drains
    /// what was already queued, then the handle completes.
    pub fn start(
        transport: Arc<dyn Mailer>,
        capacity: usize,
        policy: MailRetryPolicy,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(rx, transport, policy, cancel));
        (QueuedMailer { tx }, handle)
    }
}

#[async_trait::async_trait]
impl Mailer for QueuedMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let mail = OutgoingMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        self.tx.try_send(mail).map_err(|e| match e {
            TrySendError::Full(_) => anyhow!("mail queue full"),
            TrySendError::Closed(_) => anyhow!("mail worker stopped"),
        })?;
        debug!(%to, %subject, "mail queued");
        Ok(())
    }
}

async fn deliver(transport: &dyn Mailer, mail: &OutgoingMail, policy: &MailRetryPolicy) -> bool {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match transport.send(&mail.to, &mail.subject, &mail.body).await {
            Ok(()) => {
                debug!(to = %mail.to, attempt, "mail delivered");
                return true;
            }
            Err(e) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(to = %mail.to, attempt, ?delay, error = %e, "mail send failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(to = %mail.to, subject = %mail.subject, attempts, error = %e, "mail dropped after retries");
            }
        }
    }
    false
}

async fn run_worker(
    mut rx: mpsc::Receiver<OutgoingMail>,
    transport: Arc<dyn Mailer>,
    policy: MailRetryPolicy,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(mail) => {
                    deliver(transport.as_ref(), &mail, &policy).await;
                }
                None => {
                    info!("mail queue closed");
                    return;
                }
            },
        }
    }

    rx.close();
    while let Some(mail) = rx.recv().await {
        deliver(transport.as_ref(), &mail, &policy).await;
    }
    info!("mail worker stopped");
}
