use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use aqx_core::sinks::HubMessage;
use aqx_sdk::objects::{EntityKind, WsClientMessage, WsCloseCode, WsServerMessage};

use crate::state::AppState;

/// `GET /ws` — event stream with no initial subscription.
pub(super) async fn events_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events_ws(socket, state, None))
}

/// `GET /ws/rfq/{id}` — event stream for one RFQ.
pub(super) async fn rfq_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let topic = EntityKind::Rfq.topic(&id);
    ws.on_upgrade(move |socket| handle_events_ws(socket, state, Some(topic)))
}

/// `GET /ws/auction/{id}` — event stream for one auction.
pub(super) async fn auction_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let topic = EntityKind::Auction.topic(&id);
    ws.on_upgrade(move |socket| handle_events_ws(socket, state, Some(topic)))
}

/// Drives a single WebSocket connection.
///
/// Relays hub messages for the client's topics and applies the client's
/// subscribe/unsubscribe frames. The connection is closed when the client
/// leaves, when the hub drops the client for falling behind, or on server
/// shutdown.
async fn handle_events_ws(mut socket: WebSocket, state: AppState, initial_topic: Option<String>) {
    let mut subscription = state.hub.subscribe();
    let mut shutdown_rx = state.shutdown_rx.clone();
    if let Some(topic) = &initial_topic {
        subscription.subscribe(topic);
    }
    tracing::debug!(
        subscriber = subscription.id(),
        topic = ?initial_topic,
        "WS: client connected"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    close(&mut socket, WsCloseCode::NORMAL, "server shutting down").await;
                    return;
                }
            }

            message = subscription.recv() => {
                let Some(HubMessage { topic, event }) = message else {
                    tracing::warn!(subscriber = subscription.id(), "WS: client too slow, disconnecting");
                    close(&mut socket, WsCloseCode::SLOW_CONSUMER, "too slow").await;
                    return;
                };
                let frame = WsServerMessage::Event {
                    topic,
                    event: (*event).clone(),
                };
                if send_json(&mut socket, &frame).await.is_err() {
                    return;
                }
            }

            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsClientMessage>(text.as_str()) {
                            Ok(WsClientMessage::Subscribe { topic }) => {
                                subscription.subscribe(&topic);
                            }
                            Ok(WsClientMessage::Unsubscribe { topic }) => {
                                subscription.unsubscribe(&topic);
                            }
                            Err(e) => {
                                let reply = WsServerMessage::Error {
                                    code: WsCloseCode::POLICY_VIOLATION,
                                    reason: format!("invalid message: {e}"),
                                };
                                if send_json(&mut socket, &reply).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
