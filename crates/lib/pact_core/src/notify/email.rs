// @zen-component: NTF-EmailQueue
//
//! Asynchronous email delivery.
//!
//! Requests only *enqueue* mail; delivery happens on a background worker with
//! bounded retries. The worker is never awaited by a request path. The actual
//! transport sits behind `Mailer`; `LogMailer` is the development transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};

/// One outbound email.
#[derive(Debug, Clone)]
pub struct EmailJob {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Synchronous enqueue seam used by the dispatcher.
pub trait EmailQueue: Send + Sync {
    fn enqueue(&self, job: EmailJob) -> CoreResult<()>;
}

/// The delivery transport (SMTP, provider API, ...).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &EmailJob) -> CoreResult<()>;
}

/// Development transport: logs the mail instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, job: &EmailJob) -> CoreResult<()> {
        info!(to = ?job.to, subject = %job.subject, "email (log transport)");
        Ok(())
    }
}

/// Retry schedule for a failed delivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base, 2·base, 4·base, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Queue handle whose jobs drain through a spawned worker.
#[derive(Clone)]
pub struct ChannelEmailQueue {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailQueue for ChannelEmailQueue {
    fn enqueue(&self, job: EmailJob) -> CoreResult<()> {
        self.tx
            .send(job)
            .map_err(|_| CoreError::Internal("email worker is gone".into()))
    }
}

/// Spawn the delivery worker. Returns the queue handle and the worker task.
pub fn spawn_email_worker(
    mailer: Arc<dyn Mailer>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
) -> (ChannelEmailQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();
    let handle = tokio::spawn(async move {
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            deliver(mailer.as_ref(), &policy, job).await;
        }
    });
    (ChannelEmailQueue { tx }, handle)
}

async fn deliver(mailer: &dyn Mailer, policy: &RetryPolicy, job: EmailJob) {
    for attempt in 1..=policy.attempts {
        match mailer.send(&job).await {
            Ok(()) => return,
            Err(e) if attempt < policy.attempts => {
                warn!(
                    to = ?job.to,
                    attempt,
                    error = %e,
                    "email delivery failed, will retry"
                );
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
            Err(e) => {
                error!(to = ?job.to, attempts = policy.attempts, error = %e, "email dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyMailer {
        failures_left: AtomicU32,
        delivered: Mutex<Vec<EmailJob>>,
    }

    impl FlakyMailer {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, job: &EmailJob) -> CoreResult<()> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CoreError::Internal("smtp down".into()));
            }
            self.delivered.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    fn job() -> EmailJob {
        EmailJob {
            to: vec!["p@example.it".into()],
            subject: "hello".into(),
            html: "<p>hi</p>".into(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(5),
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn delivers_after_transient_failures() {
        let mailer = Arc::new(FlakyMailer::failing(2));
        let shutdown = CancellationToken::new();
        let (queue, _handle) = spawn_email_worker(mailer.clone(), fast_policy(), shutdown.clone());

        queue.enqueue(job()).unwrap();
        wait_for(|| !mailer.delivered.lock().unwrap().is_empty()).await;

        assert_eq!(mailer.delivered.lock().unwrap().len(), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mailer = Arc::new(FlakyMailer::failing(u32::MAX));
        let shutdown = CancellationToken::new();
        let (queue, handle) = spawn_email_worker(mailer.clone(), fast_policy(), shutdown.clone());

        queue.enqueue(job()).unwrap();
        // Drop the queue so the worker drains and exits.
        drop(queue);
        handle.await.unwrap();

        assert!(mailer.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enqueue_fails_once_worker_is_gone() {
        let mailer = Arc::new(FlakyMailer::failing(0));
        let shutdown = CancellationToken::new();
        let (queue, handle) = spawn_email_worker(mailer, fast_policy(), shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();

        assert!(queue.enqueue(job()).is_err());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }
}
