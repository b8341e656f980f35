use futures::Stream;
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Kinds of live update a viewer can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEventKind {
    NewPost,
    EditPost,
}

impl LiveEventKind {
    /// SSE event name the browser listens for.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new-post",
            Self::EditPost => "edit-post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivePayload {
    pub html: String,
    pub day: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub kind: LiveEventKind,
    pub payload: LivePayload,
}

pub type SubscriberId = u64;

/// Registry of connected viewers. Delivery is best effort and at most once:
/// each subscriber has a small buffer, and an event that doesn't fit or
/// whose receiver is gone is dropped for that subscriber only.
pub struct BroadcastHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<LiveEvent>>>,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        })
    }

    /// Register a new viewer. Dropping the returned subscription unregisters it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        tracing::debug!("Live subscriber {} connected ({} total)", id, count);

        Subscription {
            id,
            hub: Arc::downgrade(self),
            receiver,
        }
    }

    /// Remove a viewer. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!("Live subscriber {} disconnected", id);
        }
    }

    /// Fan an event out to everyone currently registered. Returns how many
    /// subscribers accepted it.
    pub fn publish(&self, kind: LiveEventKind, payload: LivePayload) -> usize {
        let event = LiveEvent { kind, payload };
        let mut delivered = 0;
        let mut gone = Vec::new();

        let mut subscribers = self.lock();
        for (id, sender) in subscribers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Live subscriber {} is lagging, dropping {}", id, kind.as_str());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            subscribers.remove(&id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<LiveEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A viewer's handle on the hub. Yields events in publish order.
pub struct Subscription {
    id: SubscriberId,
    hub: Weak<BroadcastHub>,
    receiver: mpsc::Receiver<LiveEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<LiveEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event, if one is waiting.
    pub fn try_recv(&mut self) -> Option<LiveEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = LiveEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(html: &str) -> LivePayload {
        LivePayload {
            html: html.to_string(),
            day: "2025-01-01".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = BroadcastHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let delivered = hub.publish(LiveEventKind::NewPost, payload("<div>1</div>"));
        assert_eq!(delivered, 2);

        assert_eq!(a.recv().await.unwrap().payload.html, "<div>1</div>");
        assert_eq!(b.recv().await.unwrap().kind, LiveEventKind::NewPost);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = BroadcastHub::new(8);
        let mut sub = hub.subscribe();

        hub.publish(LiveEventKind::NewPost, payload("first"));
        hub.publish(LiveEventKind::EditPost, payload("second"));
        hub.publish(LiveEventKind::EditPost, payload("third"));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(sub.recv().await.unwrap().payload.html);
        }
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = BroadcastHub::new(8);
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(LiveEventKind::NewPost, payload("x")), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = BroadcastHub::new(8);
        let sub = hub.subscribe();
        let id = sub.id();

        hub.unsubscribe(id);
        hub.unsubscribe(id);
        assert_eq!(hub.subscriber_count(), 0);

        // Drop after explicit unsubscribe is a no-op too.
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn lagging_subscriber_loses_events_without_blocking_others() {
        let hub = BroadcastHub::new(1);
        let _slow = hub.subscribe();

        assert_eq!(hub.publish(LiveEventKind::NewPost, payload("1")), 1);
        assert_eq!(hub.publish(LiveEventKind::NewPost, payload("2")), 0);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn subscription_outliving_hub_drops_cleanly() {
        let hub = BroadcastHub::new(4);
        let sub = hub.subscribe();
        drop(hub);
        drop(sub);
    }

    #[test]
    fn event_names_match_browser_listeners() {
        assert_eq!(LiveEventKind::NewPost.as_str(), "new-post");
        assert_eq!(LiveEventKind::EditPost.as_str(), "edit-post");
    }
}
