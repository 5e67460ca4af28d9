use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

/// `GET /status` — latest [`MonitorStatus`](aqx_core::processors::MonitorStatus).
///
/// Answers `503` with `{"state":"disabled"}` when no contracts are watched.
pub(super) async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match &state.monitor_status {
        Some(status) => {
            let snapshot = status.borrow().clone();
            (StatusCode::OK, Json(json!(snapshot)))
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "state": "disabled" })),
        ),
    }
}
