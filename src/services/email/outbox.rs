//! Persistent email outbox with a background delivery worker.
//!
//! A row is written as `pending` before anything is sent. Delivery claims
//! the row (`sending`) so the worker and an immediate send never both
//! deliver it, then records `sent` or `failed` with a retry time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqliteExecutor;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::{Mailer, OutgoingEmail};
use crate::db::email_logs::{self, MAX_ATTEMPTS};
use crate::db::models::{EmailLog, NewEmail};
use crate::db::{Store, StoreResult};

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const BATCH_SIZE: i64 = 50;
const BASE_BACKOFF_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
    /// Already sent, held by another sender, or out of attempts.
    Skipped,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// Seconds to wait after the `attempts`-th failure: 30 s doubling, capped at one hour.
pub fn backoff_secs(attempts: i64) -> i64 {
    let exp = (attempts - 1).clamp(0, 16) as u32;
    (BASE_BACKOFF_SECS * 2i64.pow(exp)).min(MAX_BACKOFF_SECS)
}

/// Queues an email inside the caller's transaction. Call [`Outbox::wake`]
/// after the commit so the worker picks it up.
pub async fn enqueue_in<'e, E>(ex: E, email: &NewEmail) -> StoreResult<EmailLog>
where
    E: SqliteExecutor<'e>,
{
    email_logs::insert(ex, email).await
}

#[derive(Clone)]
pub struct Outbox {
    store: Store,
    mailer: Arc<dyn Mailer>,
    notify: Arc<Notify>,
}

impl Outbox {
    pub fn new(store: Store, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }

    pub async fn enqueue(&self, email: &NewEmail) -> StoreResult<EmailLog> {
        let log = email_logs::insert(self.store.pool(), email).await?;
        self.wake();
        Ok(log)
    }

    /// Queues and attempts delivery right away. A failure stays queued for retry.
    pub async fn send_now(&self, email: &NewEmail) -> StoreResult<(EmailLog, DeliveryOutcome)> {
        let log = email_logs::insert(self.store.pool(), email).await?;
        let outcome = self.deliver(log.id).await?;
        let log = email_logs::get(self.store.pool(), log.id).await?;
        Ok((log, outcome))
    }

    pub async fn deliver(&self, id: i64) -> StoreResult<DeliveryOutcome> {
        let pool = self.store.pool();
        let Some(log) = email_logs::claim(pool, id).await? else {
            return Ok(DeliveryOutcome::Skipped);
        };

        let email = OutgoingEmail {
            to: log.recipient.clone(),
            subject: log.subject.clone(),
            html_body: log.body.clone(),
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                email_logs::mark_sent(pool, id).await?;
                tracing::info!(email_id = id, to = %log.recipient, kind = %log.kind, "email delivered");
                Ok(DeliveryOutcome::Sent)
            }
            Err(e) => {
                let attempts = log.attempts + 1;
                let next_attempt_at = Utc::now().timestamp() + backoff_secs(attempts);
                let message = e.to_string();
                email_logs::mark_failed(pool, id, &message, next_attempt_at).await?;

                if attempts >= MAX_ATTEMPTS {
                    tracing::error!(email_id = id, to = %log.recipient, attempts, error = %message, "email delivery abandoned");
                } else {
                    tracing::warn!(email_id = id, to = %log.recipient, attempts, error = %message, "email delivery failed, will retry");
                }
                Ok(DeliveryOutcome::Failed(message))
            }
        }
    }

    /// Delivers every row that is due now. Returns how many were sent.
    pub async fn process_due(&self) -> StoreResult<usize> {
        let now = Utc::now().timestamp();
        let ids = email_logs::due_ids(self.store.pool(), now, BATCH_SIZE).await?;

        let mut sent = 0;
        for id in ids {
            if self.deliver(id).await?.is_sent() {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Rows a crashed process left in `sending` go back to `pending`.
    pub async fn recover_interrupted(&self) -> StoreResult<u64> {
        let reset = email_logs::reset_sending(self.store.pool()).await?;
        if reset > 0 {
            tracing::warn!(count = reset, "requeued emails interrupted mid-delivery");
        }
        Ok(reset)
    }

    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let outbox = self.clone();
        tokio::spawn(async move {
            tracing::info!("email outbox worker started");
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = outbox.notify.notified() => {}
                }
                if let Err(e) = outbox.process_due().await {
                    tracing::error!(error = %e, "email outbox pass failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{EmailKind, EmailStatus};
    use crate::services::email::testing::RecordingMailer;

    async fn outbox() -> (Outbox, Arc<RecordingMailer>) {
        let store = Store::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        (Outbox::new(store, mailer.clone()), mailer)
    }

    fn email() -> NewEmail {
        NewEmail {
            to: "alice@example.com".to_string(),
            subject: "Bonjour".to_string(),
            kind: EmailKind::Custom,
            body: "<p>Hi</p>".to_string(),
            client_id: None,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_secs(1), 30);
        assert_eq!(backoff_secs(2), 60);
        assert_eq!(backoff_secs(3), 120);
        assert_eq!(backoff_secs(10), 3600);
    }

    #[tokio::test]
    async fn test_send_now_marks_sent() {
        let (outbox, mailer) = outbox().await;
        let (log, outcome) = outbox.send_now(&email()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Sent);
        assert_eq!(log.status, EmailStatus::Sent);
        assert_eq!(log.attempts, 1);
        assert!(log.sent_at.is_some());
        assert_eq!(mailer.sent().len(), 1);

        // A sent row is never delivered twice.
        assert_eq!(outbox.deliver(log.id).await.unwrap(), DeliveryOutcome::Skipped);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_scheduled() {
        let (outbox, mailer) = outbox().await;
        mailer.set_failing(true);

        let (log, outcome) = outbox.send_now(&email()).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(log.status, EmailStatus::Failed);
        assert_eq!(log.attempts, 1);
        assert!(log.error.as_deref().unwrap_or("").contains("connection refused"));
        assert!(log.next_attempt_at > Utc::now().timestamp());

        // Not due yet, so a pass leaves it alone.
        mailer.set_failing(false);
        assert_eq!(outbox.process_due().await.unwrap(), 0);
        assert!(mailer.sent().is_empty());

        // A retry that succeeds clears the error.
        assert_eq!(outbox.deliver(log.id).await.unwrap(), DeliveryOutcome::Sent);
        let log = email_logs::get(outbox.store.pool(), log.id).await.unwrap();
        assert_eq!(log.status, EmailStatus::Sent);
        assert_eq!(log.attempts, 2);
        assert!(log.error.is_none());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (outbox, mailer) = outbox().await;
        mailer.set_failing(true);
        let log = outbox.enqueue(&email()).await.unwrap();

        for _ in 0..MAX_ATTEMPTS {
            assert!(matches!(outbox.deliver(log.id).await.unwrap(), DeliveryOutcome::Failed(_)));
        }
        assert_eq!(outbox.deliver(log.id).await.unwrap(), DeliveryOutcome::Skipped);

        let log = email_logs::get(outbox.store.pool(), log.id).await.unwrap();
        assert_eq!(log.status, EmailStatus::Failed);
        assert_eq!(log.attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_process_due_delivers_pending_and_recovers_sending() {
        let (outbox, mailer) = outbox().await;
        let first = outbox.enqueue(&email()).await.unwrap();
        let second = outbox.enqueue(&email()).await.unwrap();

        // Simulate a crash mid-delivery.
        email_logs::claim(outbox.store.pool(), second.id).await.unwrap();
        assert_eq!(outbox.recover_interrupted().await.unwrap(), 1);

        assert_eq!(outbox.process_due().await.unwrap(), 2);
        assert_eq!(mailer.sent().len(), 2);
        let first = email_logs::get(outbox.store.pool(), first.id).await.unwrap();
        assert_eq!(first.status, EmailStatus::Sent);
    }
}
