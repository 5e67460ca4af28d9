//! WebSocket message types for the live event stream.
//!
//! The worker exposes `GET /ws` (plus pre-subscribed variants
//! `GET /ws/rfq/{id}` and `GET /ws/auction/{id}`).
//!
//! # Protocol
//!
//! 1. The client sends [`WsClientMessage`] frames to add or remove topic
//!    subscriptions. Topics are either queue topics (`rfq.events`,
//!    `auction.bids`, …) or entity topics (`rfq:1000`, `auction:7`).
//! 2. The server pushes a [`WsServerMessage::Event`] for every forwarded
//!    event matching one of the client's topics.
//! 3. A client that cannot keep up is disconnected rather than slowing
//!    down delivery to everyone else.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::events::DecodedEvent;

/// Client-to-server subscription control message.
///
/// ```json
/// {"action":"subscribe","topic":"rfq:1000"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsClientMessage {
    Subscribe { topic: CompactString },
    Unsubscribe { topic: CompactString },
}

/// Server-to-client WebSocket message.
///
/// ```json
/// {"type":"event","topic":"rfq.events","event":{ ... }}
/// {"type":"error","code":1008,"reason":"invalid message"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// A forwarded contract event.
    Event {
        /// The topic the event was delivered under.
        topic: CompactString,
        event: DecodedEvent,
    },

    /// A problem with a client frame. The connection stays open.
    Error { code: u16, reason: String },
}

/// Well-known WebSocket close codes used by the event stream.
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure on server shutdown.
    pub const NORMAL: u16 = 1000;

    /// The client sent a frame that is not a [`WsClientMessage`].
    pub const POLICY_VIOLATION: u16 = 1008;

    /// The client fell too far behind and was dropped by the hub.
    pub const SLOW_CONSUMER: u16 = 4008;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_format() {
        let msg: WsClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","topic":"rfq:1000"}"#).unwrap();
        assert_eq!(
            msg,
            WsClientMessage::Subscribe {
                topic: "rfq:1000".into()
            }
        );

        let json = serde_json::to_value(WsClientMessage::Unsubscribe {
            topic: "auction.bids".into(),
        })
        .unwrap();
        assert_eq!(json["action"], "unsubscribe");
        assert_eq!(json["topic"], "auction.bids");
    }

    #[test]
    fn test_error_message_format() {
        let json = serde_json::to_value(WsServerMessage::Error {
            code: WsCloseCode::POLICY_VIOLATION,
            reason: "invalid message".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], 1008);
    }
}
