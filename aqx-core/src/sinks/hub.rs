//! Subscriber hub for real-time event fan-out.
//!
//! Each [`Subscription`] owns a bounded queue and a set of topics. A
//! broadcast pushes to every subscriber of the topic without waiting; a
//! subscriber whose queue is full (or whose receiver is gone) is removed from
//! the hub, which closes its queue. Consumers see `None` from
//! [`Subscription::recv`] and should disconnect their client.

use aqx_sdk::objects::DecodedEvent;
use compact_str::CompactString;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// An event delivered to a subscriber, tagged with the topic it matched.
#[derive(Debug, Clone)]
pub struct HubMessage {
    pub topic: CompactString,
    pub event: Arc<DecodedEvent>,
}

struct Subscriber {
    topics: HashSet<CompactString>,
    tx: mpsc::Sender<HubMessage>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

#[derive(Clone)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
    buffer: usize,
}

impl Hub {
    pub const DEFAULT_BUFFER: usize = 256;

    /// Create a hub whose subscribers each buffer up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Arc::default(),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber with no topics.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                topics: HashSet::new(),
                tx,
            },
        );
        debug!(subscriber = id, "Hub subscriber registered");
        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Deliver `event` to every subscriber of `topic`. Returns the number of
    /// subscribers that accepted it.
    pub fn broadcast(&self, topic: &str, event: &Arc<DecodedEvent>) -> usize {
        let mut state = self.lock();
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for (id, subscriber) in &state.subscribers {
            if !subscriber.topics.contains(topic) {
                continue;
            }
            let message = HubMessage {
                topic: topic.into(),
                event: event.clone(),
            };
            match subscriber.tx.try_send(message) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = id, topic, "Subscriber buffer full, dropping subscriber");
                    dropped.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*id),
            }
        }

        for id in dropped {
            state.subscribers.remove(&id);
        }
        delivered
    }

    fn update_topics(&self, id: u64, update: impl FnOnce(&mut HashSet<CompactString>)) -> bool {
        match self.lock().subscribers.get_mut(&id) {
            Some(subscriber) => {
                update(&mut subscriber.topics);
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: u64) {
        if self.lock().subscribers.remove(&id).is_some() {
            debug!(subscriber = id, "Hub subscriber removed");
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUFFER)
    }
}

/// A hub subscriber. Dropping it unregisters it.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<HubMessage>,
    hub: Hub,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start receiving events for `topic`. Returns `false` if the hub has
    /// already dropped this subscriber.
    pub fn subscribe(&self, topic: &str) -> bool {
        self.hub.update_topics(self.id, |topics| {
            topics.insert(topic.into());
        })
    }

    /// Stop receiving events for `topic`.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        self.hub.update_topics(self.id, |topics| {
            topics.remove(topic);
        })
    }

    /// Next event, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<HubMessage> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqx_sdk::objects::{EventKind, Provenance};
    use std::collections::BTreeMap;

    fn event(id: &str) -> Arc<DecodedEvent> {
        Arc::new(DecodedEvent {
            kind: EventKind::RfqCreated,
            fields: BTreeMap::from([("rfq_id".into(), id.to_owned())]),
            provenance: Provenance {
                tx_hash: "0x01".into(),
                block_number: 1,
                block_hash: "0x02".into(),
                log_index: 0,
                contract_address: "0x03".into(),
            },
        })
    }

    #[tokio::test]
    async fn test_topic_filtering() {
        let hub = Hub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert!(a.subscribe("rfq.events"));
        assert!(b.subscribe("rfq:7"));

        assert_eq!(hub.broadcast("rfq.events", &event("1")), 1);
        assert_eq!(hub.broadcast("rfq:7", &event("7")), 1);
        assert_eq!(hub.broadcast("auction.events", &event("9")), 0);

        let message = a.recv().await.unwrap();
        assert_eq!(message.topic, "rfq.events");
        assert_eq!(message.event.field("rfq_id"), Some("1"));
        let message = b.recv().await.unwrap();
        assert_eq!(message.topic, "rfq:7");
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = Hub::default();
        let sub = hub.subscribe();
        sub.subscribe("rfq.events");
        sub.unsubscribe("rfq.events");
        assert_eq!(hub.broadcast("rfq.events", &event("1")), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_dropped() {
        let hub = Hub::new(2);
        let mut slow = hub.subscribe();
        let fast = hub.subscribe();
        slow.subscribe("rfq.events");
        fast.subscribe("auction.events");

        assert_eq!(hub.broadcast("rfq.events", &event("1")), 1);
        assert_eq!(hub.broadcast("rfq.events", &event("2")), 1);
        assert_eq!(hub.broadcast("rfq.events", &event("3")), 0);
        assert_eq!(hub.subscriber_count(), 1);

        // Buffered events drain, then the closed queue ends the stream.
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
        assert!(!slow.subscribe("rfq.events"));
    }

    #[test]
    fn test_drop_unregisters() {
        let hub = Hub::default();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
