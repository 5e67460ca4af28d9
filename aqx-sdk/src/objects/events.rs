//! Normalized contract events as published to the queue and the hub.
//!
//! Every payload is a flat JSON object:
//!
//! ```json
//! {
//!   "type": "rfq_created",
//!   "rfq_id": "1000",
//!   "borrower": "0x0000000000000000000000000000000000000aBc",
//!   "amount": "500",
//!   "duration": "2592000",
//!   "tx_hash": "0x…",
//!   "block_number": 101,
//!   "block_hash": "0x…",
//!   "log_index": 0,
//!   "contract_address": "0x…"
//! }
//! ```
//!
//! Decoded integers are always decimal strings so that `uint256` values
//! survive consumers with 53-bit JSON numbers.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed set of contract events understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RfqCreated,
    QuoteSubmitted,
    QuoteAccepted,
    RfqExecuted,
    AuctionCreated,
    BidPlaced,
    AuctionFinalized,
    AuctionSettled,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::RfqCreated,
        EventKind::QuoteSubmitted,
        EventKind::QuoteAccepted,
        EventKind::RfqExecuted,
        EventKind::AuctionCreated,
        EventKind::BidPlaced,
        EventKind::AuctionFinalized,
        EventKind::AuctionSettled,
    ];

    /// The `type` tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RfqCreated => "rfq_created",
            EventKind::QuoteSubmitted => "quote_submitted",
            EventKind::QuoteAccepted => "quote_accepted",
            EventKind::RfqExecuted => "rfq_executed",
            EventKind::AuctionCreated => "auction_created",
            EventKind::BidPlaced => "bid_placed",
            EventKind::AuctionFinalized => "auction_finalized",
            EventKind::AuctionSettled => "auction_settled",
        }
    }

    /// Which aggregate the event belongs to.
    pub fn entity(&self) -> EntityKind {
        match self {
            EventKind::RfqCreated
            | EventKind::QuoteSubmitted
            | EventKind::QuoteAccepted
            | EventKind::RfqExecuted => EntityKind::Rfq,
            EventKind::AuctionCreated
            | EventKind::BidPlaced
            | EventKind::AuctionFinalized
            | EventKind::AuctionSettled => EntityKind::Auction,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregate an event refers to (an RFQ or an auction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Rfq,
    Auction,
}

impl EntityKind {
    /// Name of the decoded field carrying the aggregate id.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::Rfq => "rfq_id",
            EntityKind::Auction => "auction_id",
        }
    }

    /// Per-entity subscription topic, e.g. `rfq:1000`.
    pub fn topic(&self, id: &str) -> String {
        match self {
            EntityKind::Rfq => format!("rfq:{id}"),
            EntityKind::Auction => format!("auction:{id}"),
        }
    }
}

/// Where a decoded event came from on chain.
///
/// `(tx_hash, log_index)` uniquely identifies a log and is the
/// deduplication key for consumers, since delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub tx_hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub log_index: u64,
    pub contract_address: String,
}

/// A decoded contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireDecodedEvent")]
pub struct DecodedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub fields: BTreeMap<CompactString, String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

// Provenance keys must be matched by name before the flattened field map
// swallows the rest, so deserialization goes through this shape.
#[derive(Deserialize)]
struct WireDecodedEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    tx_hash: String,
    block_number: u64,
    block_hash: String,
    log_index: u64,
    contract_address: String,
    #[serde(flatten)]
    fields: BTreeMap<CompactString, String>,
}

impl From<WireDecodedEvent> for DecodedEvent {
    fn from(wire: WireDecodedEvent) -> Self {
        Self {
            kind: wire.kind,
            fields: wire.fields,
            provenance: Provenance {
                tx_hash: wire.tx_hash,
                block_number: wire.block_number,
                block_hash: wire.block_hash,
                log_index: wire.log_index,
                contract_address: wire.contract_address,
            },
        }
    }
}

impl DecodedEvent {
    /// Look up a decoded field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The RFQ or auction id this event refers to.
    pub fn entity_id(&self) -> Option<&str> {
        self.field(self.kind.entity().id_field())
    }

    /// Deduplication key for downstream consumers.
    pub fn dedup_key(&self) -> (&str, u64) {
        (&self.provenance.tx_hash, self.provenance.log_index)
    }
}
