//! Redis list-backed queue publisher.
//!
//! Each topic is a Redis list under a configurable prefix, e.g. with prefix
//! `aqx` the topic `rfq.events` is the list `aqx:rfq.events`. Events are
//! appended with `RPUSH` as JSON payloads, so consumers `BLPOP` in order.

use super::{PublishError, Publisher};
use aqx_sdk::objects::DecodedEvent;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

#[derive(Clone)]
pub struct RedisPublisher {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisPublisher {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, PublishError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(prefix, "Connected to Redis");
        Ok(Self {
            conn,
            prefix: prefix.to_owned(),
        })
    }

    fn key(&self, topic: &str) -> String {
        queue_key(&self.prefix, topic)
    }
}

fn queue_key(prefix: &str, topic: &str) -> String {
    if prefix.is_empty() {
        topic.to_owned()
    } else {
        format!("{prefix}:{topic}")
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, topic: &str, event: &DecodedEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let key = self.key(topic);
        let mut conn = self.conn.clone();
        let len: i64 = conn.rpush(&key, payload).await?;
        debug!(key, len, kind = %event.kind, "Published event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_key() {
        assert_eq!(queue_key("aqx", "rfq.events"), "aqx:rfq.events");
        assert_eq!(queue_key("", "auction.bids"), "auction.bids");
    }
}
