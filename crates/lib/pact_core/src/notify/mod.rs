// @zen-component: NTF-Dispatcher
//
//! Notification fan-out.
//!
//! One business event per recipient becomes: a persisted notification row,
//! a realtime push (record + unread badge), and an enqueued email. The row is
//! the source of truth; push and email are side channels whose failures are
//! logged and never propagate into the triggering business transaction.

pub mod email;
pub mod queries;
pub mod realtime;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::notification::{Notification, NotificationKind};
use crate::notify::email::{EmailJob, EmailQueue};
use crate::notify::realtime::{RealtimeEvent, RealtimeSink};

/// Persistence the dispatcher needs: notification rows plus the recipient's
/// registered address.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        subject: &str,
        content: &str,
    ) -> CoreResult<Notification>;

    async fn unread_count(&self, user_id: Uuid) -> CoreResult<i64>;

    async fn user_email(&self, user_id: Uuid) -> CoreResult<Option<String>>;
}

/// Postgres-backed store.
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        subject: &str,
        content: &str,
    ) -> CoreResult<Notification> {
        queries::insert_notification(&self.pool, user_id, kind, subject, content).await
    }

    async fn unread_count(&self, user_id: Uuid) -> CoreResult<i64> {
        queries::unread_count(&self.pool, user_id).await
    }

    async fn user_email(&self, user_id: Uuid) -> CoreResult<Option<String>> {
        queries::user_email(&self.pool, user_id).await
    }
}

/// How the email channel behaves for one event.
#[derive(Debug, Clone)]
pub enum EmailPolicy {
    /// Mail the recipient's registered address with the notification content.
    Default,
    /// No email for this event.
    Suppress,
    /// Mail a different address and/or body (e.g. an applicant without an
    /// account yet).
    Override { to: String, html: String },
}

/// One event to fan out.
#[derive(Debug, Clone)]
pub struct NotifyInput {
    pub kind: NotificationKind,
    pub subject: String,
    pub content: String,
    pub email: EmailPolicy,
}

impl NotifyInput {
    pub fn new(kind: NotificationKind, subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            content: content.into(),
            email: EmailPolicy::Default,
        }
    }

    pub fn suppress_email(mut self) -> Self {
        self.email = EmailPolicy::Suppress;
        self
    }
}

/// Fans one business event out to the three channels.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    realtime: Arc<dyn RealtimeSink>,
    email: Arc<dyn EmailQueue>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        realtime: Arc<dyn RealtimeSink>,
        email: Arc<dyn EmailQueue>,
    ) -> Self {
        Self {
            store,
            realtime,
            email,
        }
    }

    /// Notify one recipient. The row insert is the only fallible step that
    /// propagates; push and email failures are logged and swallowed.
    pub async fn notify_one(&self, user_id: Uuid, input: &NotifyInput) -> CoreResult<Notification> {
        let notification = self
            .store
            .insert(user_id, input.kind, &input.subject, &input.content)
            .await?;

        if let Err(e) = self
            .realtime
            .emit(user_id, RealtimeEvent::NewNotification(notification.clone()))
            .await
        {
            warn!(%user_id, error = %e, "realtime notification push failed");
        }
        match self.store.unread_count(user_id).await {
            Ok(unread) => {
                if let Err(e) = self
                    .realtime
                    .emit(user_id, RealtimeEvent::UnreadCount { unread })
                    .await
                {
                    warn!(%user_id, error = %e, "realtime unread-count push failed");
                }
            }
            Err(e) => warn!(%user_id, error = %e, "unread count lookup failed"),
        }

        match &input.email {
            EmailPolicy::Suppress => {}
            EmailPolicy::Default => match self.store.user_email(user_id).await {
                Ok(Some(address)) => self.enqueue_logged(EmailJob {
                    to: vec![address],
                    subject: input.subject.clone(),
                    html: input.content.clone(),
                }),
                Ok(None) => warn!(%user_id, "recipient has no email address"),
                Err(e) => warn!(%user_id, error = %e, "recipient email lookup failed"),
            },
            EmailPolicy::Override { to, html } => self.enqueue_logged(EmailJob {
                to: vec![to.clone()],
                subject: input.subject.clone(),
                html: html.clone(),
            }),
        }

        Ok(notification)
    }

    /// Notify many recipients with per-recipient isolation: one recipient's
    /// failure is logged and does not affect the others. Returns the
    /// successfully created rows.
    pub async fn notify_many(
        &self,
        user_ids: &[Uuid],
        input: &NotifyInput,
    ) -> Vec<Notification> {
        let mut created = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            match self.notify_one(user_id, input).await {
                Ok(notification) => created.push(notification),
                Err(e) => warn!(%user_id, error = %e, "notification fan-out failed for recipient"),
            }
        }
        created
    }

    /// Enqueue a standalone email with no notification row, for recipients
    /// who have no user account (e.g. onboarding applicants).
    pub fn send_email(&self, to: &str, subject: &str, html: &str) {
        self.enqueue_logged(EmailJob {
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        });
    }

    fn enqueue_logged(&self, job: EmailJob) {
        if let Err(e) = self.email.enqueue(job) {
            warn!(error = %e, "email enqueue failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;

    use crate::error::CoreError;
    use crate::uuid::uuidv7;

    /// In-memory store: rows plus a fixed user→email map.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Notification>>,
        emails: Mutex<std::collections::HashMap<Uuid, String>>,
    }

    #[async_trait]
    impl NotificationStore for MemoryStore {
        async fn insert(
            &self,
            user_id: Uuid,
            kind: NotificationKind,
            subject: &str,
            content: &str,
        ) -> CoreResult<Notification> {
            let notification = Notification {
                id: uuidv7(),
                user_id,
                kind,
                subject: subject.to_string(),
                content: content.to_string(),
                read: false,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(notification.clone());
            Ok(notification)
        }

        async fn unread_count(&self, user_id: Uuid) -> CoreResult<i64> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.user_id == user_id && !n.read)
                .count() as i64)
        }

        async fn user_email(&self, user_id: Uuid) -> CoreResult<Option<String>> {
            Ok(self.emails.lock().unwrap().get(&user_id).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Uuid, RealtimeEvent)>>,
    }

    #[async_trait]
    impl RealtimeSink for RecordingSink {
        async fn emit(&self, user_id: Uuid, event: RealtimeEvent) -> CoreResult<()> {
            self.events.lock().unwrap().push((user_id, event));
            Ok(())
        }
    }

    /// Queue that rejects mail for one poisoned address.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<EmailJob>>,
        poisoned: Option<String>,
    }

    impl EmailQueue for RecordingQueue {
        fn enqueue(&self, job: EmailJob) -> CoreResult<()> {
            if let Some(poisoned) = &self.poisoned
                && job.to.iter().any(|to| to == poisoned)
            {
                return Err(CoreError::Internal("queue refused".into()));
            }
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn setup(
        users: &[(Uuid, &str)],
        poisoned: Option<&str>,
    ) -> (Dispatcher, Arc<MemoryStore>, Arc<RecordingSink>, Arc<RecordingQueue>) {
        let store = Arc::new(MemoryStore::default());
        for (id, email) in users {
            store
                .emails
                .lock()
                .unwrap()
                .insert(*id, email.to_string());
        }
        let sink = Arc::new(RecordingSink::default());
        let queue = Arc::new(RecordingQueue {
            jobs: Mutex::new(Vec::new()),
            poisoned: poisoned.map(str::to_string),
        });
        let dispatcher = Dispatcher::new(store.clone(), sink.clone(), queue.clone());
        (dispatcher, store, sink, queue)
    }

    #[tokio::test]
    async fn notify_one_hits_all_three_channels() {
        let user = Uuid::new_v4();
        let (dispatcher, store, sink, queue) = setup(&[(user, "u@example.it")], None);

        let input = NotifyInput::new(NotificationKind::Welcome, "Welcome", "Hello");
        let created = dispatcher.notify_one(user, &input).await.unwrap();
        assert!(!created.read);

        assert_eq!(store.rows.lock().unwrap().len(), 1);
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].1, RealtimeEvent::NewNotification(_)));
        assert!(matches!(events[1].1, RealtimeEvent::UnreadCount { unread: 1 }));
        assert_eq!(queue.jobs.lock().unwrap().len(), 1);
        assert_eq!(queue.jobs.lock().unwrap()[0].to, vec!["u@example.it"]);
    }

    #[tokio::test]
    async fn suppressed_email_still_persists_and_pushes() {
        let user = Uuid::new_v4();
        let (dispatcher, store, sink, queue) = setup(&[(user, "u@example.it")], None);

        let input =
            NotifyInput::new(NotificationKind::ConventionUploaded, "s", "c").suppress_email();
        dispatcher.notify_one(user, &input).await.unwrap();

        assert_eq!(store.rows.lock().unwrap().len(), 1);
        assert_eq!(sink.events.lock().unwrap().len(), 2);
        assert!(queue.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_override_goes_to_the_given_address() {
        let user = Uuid::new_v4();
        let (dispatcher, _store, _sink, queue) = setup(&[(user, "u@example.it")], None);

        let mut input = NotifyInput::new(NotificationKind::OnboardingApproved, "s", "c");
        input.email = EmailPolicy::Override {
            to: "applicant@example.it".into(),
            html: "<p>register here</p>".into(),
        };
        dispatcher.notify_one(user, &input).await.unwrap();

        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(jobs[0].to, vec!["applicant@example.it"]);
        assert_eq!(jobs[0].html, "<p>register here</p>");
    }

    #[tokio::test]
    async fn one_failing_email_does_not_affect_other_recipients() {
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (dispatcher, store, sink, queue) = setup(
            &[(u1, "u1@example.it"), (u2, "u2@example.it"), (u3, "u3@example.it")],
            Some("u2@example.it"),
        );

        let input = NotifyInput::new(NotificationKind::OnboardingSubmitted, "s", "c");
        let created = dispatcher.notify_many(&[u1, u2, u3], &input).await;

        // u2's email enqueue throws, but all three rows and all six pushes land.
        assert_eq!(created.len(), 3);
        assert_eq!(store.rows.lock().unwrap().len(), 3);
        assert_eq!(sink.events.lock().unwrap().len(), 6);

        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| !j.to.contains(&"u2@example.it".to_string())));
    }

    #[tokio::test]
    async fn recipient_without_address_still_gets_row_and_push() {
        let user = Uuid::new_v4();
        let (dispatcher, store, sink, queue) = setup(&[], None);

        let input = NotifyInput::new(NotificationKind::Welcome, "s", "c");
        dispatcher.notify_one(user, &input).await.unwrap();

        assert_eq!(store.rows.lock().unwrap().len(), 1);
        assert_eq!(sink.events.lock().unwrap().len(), 2);
        assert!(queue.jobs.lock().unwrap().is_empty());
    }
}
