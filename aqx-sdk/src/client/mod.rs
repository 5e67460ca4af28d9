//! WebSocket client for the live event stream.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `tokio-tungstenite`.

mod events;

pub use events::EventStreamClient;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, handshake, connection reset, …).
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame could not be serialized or deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server reported a problem with one of our frames.
    #[error("server error {code}: {reason}")]
    Server { code: u16, reason: String },
}
