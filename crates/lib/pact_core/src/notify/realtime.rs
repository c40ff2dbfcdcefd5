// @zen-component: NTF-RealtimeChannel
//
//! Per-user realtime push.
//!
//! The dispatcher emits two event shapes on a user's private channel:
//! `new-notification` with the created record, then `unread-count` with the
//! fresh badge value. Delivery is fire-and-forget; a user with no open
//! connection simply misses the push and catches up from the persisted rows.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::notification::Notification;

/// Events pushed to a user's private channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    NewNotification(Notification),
    UnreadCount { unread: i64 },
}

/// Addressable per-user pub/sub.
#[async_trait]
pub trait RealtimeSink: Send + Sync {
    async fn emit(&self, user_id: Uuid, event: RealtimeEvent) -> CoreResult<()>;
}

/// Per-subscriber buffer depth before a slow consumer starts losing events.
const CHANNEL_CAPACITY: usize = 32;

/// In-process hub: one broadcast channel per connected user.
///
/// Boundary code subscribes on connection open (SSE/WebSocket) and forwards
/// the serialized events; the hub stays transport-agnostic.
#[derive(Default)]
pub struct BroadcastHub {
    channels: DashMap<Uuid, broadcast::Sender<RealtimeEvent>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for one user, creating the channel on first use.
    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<RealtimeEvent> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[async_trait]
impl RealtimeSink for BroadcastHub {
    async fn emit(&self, user_id: Uuid, event: RealtimeEvent) -> CoreResult<()> {
        if let Some(sender) = self.channels.get(&user_id) {
            // A send error means every receiver is gone; the user went away
            // between lookup and send. Not a failure.
            let _ = sender.send(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::notification::NotificationKind;

    fn notification(user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: NotificationKind::Welcome,
            subject: "s".into(),
            content: "c".into(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_order() {
        let hub = BroadcastHub::new();
        let user = Uuid::new_v4();
        let mut rx = hub.subscribe(user);

        hub.emit(user, RealtimeEvent::NewNotification(notification(user)))
            .await
            .unwrap();
        hub.emit(user, RealtimeEvent::UnreadCount { unread: 1 })
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            RealtimeEvent::NewNotification(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RealtimeEvent::UnreadCount { unread: 1 }
        ));
    }

    #[tokio::test]
    async fn emit_to_absent_user_is_a_no_op() {
        let hub = BroadcastHub::new();
        hub.emit(Uuid::new_v4(), RealtimeEvent::UnreadCount { unread: 0 })
            .await
            .unwrap();
    }

    #[test]
    fn event_wire_shape() {
        let event = RealtimeEvent::UnreadCount { unread: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "unread-count");
        assert_eq!(json["payload"]["unread"], 3);
    }
}
