//! Downstream capabilities the forwarder writes to.
//!
//! - [`Publisher`]: the durable message queue, one topic per event family.
//! - [`Store`]: the analytical store, one row per created RFQ or auction.
//! - [`Hub`]: in-process fan-out to real-time subscribers.

pub mod hub;
pub mod postgres;
pub mod redis_queue;

pub use hub::{Hub, HubMessage, Subscription};
pub use postgres::PgStore;
pub use redis_queue::RedisPublisher;

use aqx_sdk::objects::DecodedEvent;
use async_trait::async_trait;
use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize event: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(CompactString),

    #[error("row has no columns")]
    EmptyRow,
}

/// Publishes events to a message queue topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &DecodedEvent) -> Result<(), PublishError>;
}

/// Inserts rows into a named table.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, table: &str, row: StoreRow) -> Result<(), StoreError>;
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    Text(String),
    BigInt(i64),
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::Text(value)
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::Text(value.to_owned())
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        StoreValue::BigInt(value)
    }
}

/// An ordered list of `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreRow {
    columns: Vec<(CompactString, StoreValue)>,
}

impl StoreRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<StoreValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&StoreValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(CompactString, StoreValue)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for StoreRow {
    type Item = (CompactString, StoreValue);
    type IntoIter = std::vec::IntoIter<(CompactString, StoreValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
