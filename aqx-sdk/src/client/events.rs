//! Subscriber client (frontend or service → AQX worker).

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::ClientError;
use crate::objects::{DecodedEvent, WsClientMessage, WsServerMessage};

/// A live connection to the worker's `/ws` endpoint.
///
/// ```no_run
/// # async fn demo() -> Result<(), aqx_sdk::client::ClientError> {
/// use aqx_sdk::client::EventStreamClient;
///
/// let mut client = EventStreamClient::connect("ws://localhost:8080/ws").await?;
/// client.subscribe("rfq.events").await?;
/// while let Some((topic, event)) = client.next_event().await? {
///     println!("{topic}: {} in block {}", event.kind, event.provenance.block_number);
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventStreamClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStreamClient {
    /// Open a websocket connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url).await?;
        Ok(Self { socket })
    }

    /// Start receiving events published under `topic`.
    pub async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.send(&WsClientMessage::Subscribe {
            topic: topic.into(),
        })
        .await
    }

    /// Stop receiving events published under `topic`.
    pub async fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.send(&WsClientMessage::Unsubscribe {
            topic: topic.into(),
        })
        .await
    }

    /// Wait for the next event.
    ///
    /// Returns `Ok(None)` once the server closes the connection.
    pub async fn next_event(&mut self) -> Result<Option<(String, DecodedEvent)>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str::<WsServerMessage>(&text)? {
                    WsServerMessage::Event { topic, event } => {
                        return Ok(Some((topic.into_string(), event)));
                    }
                    WsServerMessage::Error { code, reason } => {
                        return Err(ClientError::Server { code, reason });
                    }
                },
                Message::Close(_) => return Ok(None),
                // Pings are answered by tungstenite itself.
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Close the connection gracefully.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, message: &WsClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }
}
