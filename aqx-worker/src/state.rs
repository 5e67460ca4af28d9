//! Application state shared across all request handlers.

use aqx_core::processors::MonitorStatus;
use aqx_core::sinks::Hub;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out of forwarded events to websocket clients.
    pub hub: Hub,
    /// Latest monitor snapshot. `None` when monitoring is disabled.
    pub monitor_status: Option<watch::Receiver<MonitorStatus>>,
    /// Flips to `true` when the process is shutting down.
    pub shutdown_rx: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        hub: Hub,
        monitor_status: Option<watch::Receiver<MonitorStatus>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            hub,
            monitor_status,
            shutdown_rx,
        }
    }
}
