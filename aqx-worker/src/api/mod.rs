//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `GET /status`            – current monitor snapshot
//! - `GET /ws`                – event stream, client-managed subscriptions
//! - `GET /ws/rfq/{id}`       – event stream subscribed to `rfq:{id}`
//! - `GET /ws/auction/{id}`   – event stream subscribed to `auction:{id}`

use axum::{Router, routing::get};

use crate::state::AppState;

mod status;
mod ws;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::get_status))
        .route("/ws", get(ws::events_ws))
        .route("/ws/rfq/{id}", get(ws::rfq_ws))
        .route("/ws/auction/{id}", get(ws::auction_ws))
}
