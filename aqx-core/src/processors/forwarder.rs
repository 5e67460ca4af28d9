//! Event forwarder.
//!
//! Routes each decoded event to its queue topic, writes a row to the store
//! for creation events and pushes the event to the subscriber hub.
//!
//! The queue publish is the only side effect that can fail a forward. Store
//! writes and hub delivery are best-effort and only logged.

use crate::sinks::{Hub, PublishError, Publisher, Store, StoreRow};
use aqx_sdk::objects::{DecodedEvent, EventKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const RFQ_EVENTS: &str = "rfq.events";
pub const RFQ_QUOTES: &str = "rfq.quotes";
pub const AUCTION_EVENTS: &str = "auction.events";
pub const AUCTION_BIDS: &str = "auction.bids";

pub const RFQS_TABLE: &str = "rfqs";
pub const AUCTIONS_TABLE: &str = "auctions";

const OPEN_STATUS: &str = "Open";

/// Where an event kind goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub topic: &'static str,
    pub table: Option<&'static str>,
}

/// The routing table.
pub fn route(kind: EventKind) -> Route {
    let (topic, table) = match kind {
        EventKind::RfqCreated => (RFQ_EVENTS, Some(RFQS_TABLE)),
        EventKind::QuoteSubmitted => (RFQ_QUOTES, None),
        EventKind::QuoteAccepted | EventKind::RfqExecuted => (RFQ_EVENTS, None),
        EventKind::AuctionCreated => (AUCTION_EVENTS, Some(AUCTIONS_TABLE)),
        EventKind::BidPlaced => (AUCTION_BIDS, None),
        EventKind::AuctionFinalized | EventKind::AuctionSettled => (AUCTION_EVENTS, None),
    };
    Route { topic, table }
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to publish {kind} to {topic}: {source}")]
    Publish {
        kind: EventKind,
        topic: &'static str,
        #[source]
        source: PublishError,
    },
}

/// What happened to a forwarded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOutcome {
    pub topic: &'static str,
    /// A store row was written (or already existed).
    pub stored: bool,
    /// Number of hub subscribers that received the event.
    pub delivered: usize,
}

pub struct EventForwarder {
    publisher: Arc<dyn Publisher>,
    store: Option<Arc<dyn Store>>,
    hub: Option<Hub>,
}

impl EventForwarder {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            store: None,
            hub: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_hub(mut self, hub: Hub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub async fn forward(&self, event: &DecodedEvent) -> Result<ForwardOutcome, ForwardError> {
        let Route { topic, table } = route(event.kind);

        self.publisher
            .publish(topic, event)
            .await
            .map_err(|source| ForwardError::Publish {
                kind: event.kind,
                topic,
                source,
            })?;

        let mut stored = false;
        if let (Some(store), Some(table)) = (&self.store, table) {
            match store_row(event) {
                Some(row) => match store.insert(table, row).await {
                    Ok(()) => stored = true,
                    Err(e) => {
                        warn!(
                            error = %e,
                            table,
                            tx_hash = %event.provenance.tx_hash,
                            log_index = event.provenance.log_index,
                            "Failed to store event"
                        );
                    }
                },
                None => {
                    error!(kind = %event.kind, "Decoded event has no valid store row");
                }
            }
        }

        let delivered = self.broadcast(topic, event);

        debug!(
            kind = %event.kind,
            topic,
            stored,
            delivered,
            block_number = event.provenance.block_number,
            "Forwarded event"
        );
        Ok(ForwardOutcome {
            topic,
            stored,
            delivered,
        })
    }

    fn broadcast(&self, topic: &str, event: &DecodedEvent) -> usize {
        let Some(hub) = &self.hub else {
            return 0;
        };
        let event = Arc::new(event.clone());
        let mut delivered = hub.broadcast(topic, &event);
        if let Some(id) = event.entity_id() {
            let entity_topic = event.kind.entity().topic(id);
            delivered += hub.broadcast(&entity_topic, &event);
        }
        delivered
    }
}

/// The row written for creation events.
pub fn store_row(event: &DecodedEvent) -> Option<StoreRow> {
    let (id_column, extra_column) = match event.kind {
        EventKind::RfqCreated => ("rfq_id", "duration"),
        EventKind::AuctionCreated => ("auction_id", "end_time"),
        _ => return None,
    };

    let Ok(block_number) = i64::try_from(event.provenance.block_number) else {
        warn!(
            block_number = event.provenance.block_number,
            tx_hash = %event.provenance.tx_hash,
            "Block number does not fit the store column, skipping row"
        );
        return None;
    };
    let row = StoreRow::new()
        .with(id_column, event.field(id_column)?)
        .with("borrower_address", event.field("borrower")?)
        .with("amount", event.field("amount")?)
        .with(extra_column, event.field(extra_column)?)
        .with("status", OPEN_STATUS)
        .with("tx_hash", event.provenance.tx_hash.as_str())
        .with("block_number", block_number)
        .with("created_at", time::OffsetDateTime::now_utc().unix_timestamp());
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::StoreValue;
    use crate::test_support::{FakePublisher, FakeStore, sample_event};

    #[test]
    fn test_routing_table() {
        assert_eq!(route(EventKind::RfqCreated), Route { topic: "rfq.events", table: Some("rfqs") });
        assert_eq!(route(EventKind::QuoteSubmitted).topic, "rfq.quotes");
        assert_eq!(route(EventKind::QuoteAccepted).topic, "rfq.events");
        assert_eq!(route(EventKind::RfqExecuted).topic, "rfq.events");
        assert_eq!(
            route(EventKind::AuctionCreated),
            Route { topic: "auction.events", table: Some("auctions") }
        );
        assert_eq!(route(EventKind::BidPlaced).topic, "auction.bids");
        assert_eq!(route(EventKind::AuctionFinalized).table, None);
        assert_eq!(route(EventKind::AuctionSettled).topic, "auction.events");
    }

    #[test]
    fn test_store_row_for_rfq_created() {
        let event = sample_event(EventKind::RfqCreated, "1000", 101, 0);
        let row = store_row(&event).unwrap();
        assert_eq!(row.get("rfq_id"), Some(&StoreValue::Text("1000".into())));
        assert_eq!(row.get("status"), Some(&StoreValue::Text("Open".into())));
        assert_eq!(row.get("block_number"), Some(&StoreValue::BigInt(101)));
        assert!(row.get("duration").is_some());
        assert!(row.get("created_at").is_some());

        let quote = sample_event(EventKind::QuoteSubmitted, "1000", 101, 1);
        assert!(store_row(&quote).is_none());
    }

    #[tokio::test]
    async fn test_oversized_block_number_is_not_stored() {
        let event = sample_event(EventKind::RfqCreated, "1000", u64::MAX, 0);
        assert!(store_row(&event).is_none());

        let publisher = Arc::new(FakePublisher::default());
        let store = Arc::new(FakeStore::default());
        let forwarder = EventForwarder::new(publisher.clone()).with_store(store.clone());
        let outcome = forwarder.forward(&event).await.unwrap();
        assert!(!outcome.stored);
        assert_eq!(publisher.count(), 1);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_forward_publishes_and_stores() {
        let publisher = Arc::new(FakePublisher::default());
        let store = Arc::new(FakeStore::default());
        let forwarder = EventForwarder::new(publisher.clone()).with_store(store.clone());

        let event = sample_event(EventKind::AuctionCreated, "5", 200, 3);
        let outcome = forwarder.forward(&event).await.unwrap();

        assert_eq!(outcome.topic, "auction.events");
        assert!(outcome.stored);
        assert_eq!(publisher.topics(), vec!["auction.events".to_owned()]);
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "auctions");
    }

    #[tokio::test]
    async fn test_publish_failure_skips_store() {
        let publisher = Arc::new(FakePublisher::failing_on(["1000"]));
        let store = Arc::new(FakeStore::default());
        let forwarder = EventForwarder::new(publisher.clone()).with_store(store.clone());

        let event = sample_event(EventKind::RfqCreated, "1000", 101, 0);
        let err = forwarder.forward(&event).await.unwrap_err();
        assert!(matches!(err, ForwardError::Publish { topic: "rfq.events", .. }));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_forward() {
        let publisher = Arc::new(FakePublisher::default());
        let store = Arc::new(FakeStore::failing());
        let forwarder = EventForwarder::new(publisher.clone()).with_store(store);

        let event = sample_event(EventKind::RfqCreated, "1000", 101, 0);
        let outcome = forwarder.forward(&event).await.unwrap();
        assert!(!outcome.stored);
        assert_eq!(publisher.topics().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_to_queue_and_entity_topics() {
        let hub = Hub::default();
        let mut all = hub.subscribe();
        let mut single = hub.subscribe();
        all.subscribe("rfq.quotes");
        single.subscribe("rfq:1000");

        let forwarder = EventForwarder::new(Arc::new(FakePublisher::default())).with_hub(hub);
        let event = sample_event(EventKind::QuoteSubmitted, "1000", 101, 1);
        let outcome = forwarder.forward(&event).await.unwrap();

        assert_eq!(outcome.delivered, 2);
        assert_eq!(all.recv().await.unwrap().topic, "rfq.quotes");
        assert_eq!(single.recv().await.unwrap().topic, "rfq:1000");
    }
}
