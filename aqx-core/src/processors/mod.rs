//! Pipeline stages.
//!
//! - `BlockRangeScanner`: fetches the logs of the watched contracts for a
//!   block range, in chain order
//! - `LogDecoder`: turns raw logs into `DecodedEvent`s
//! - `EventForwarder`: publishes, stores and broadcasts decoded events
//! - `Monitor`: drives the stages on a timer and owns the scan cursor

pub mod decoder;
pub mod forwarder;
pub mod monitor;
pub mod scanner;

pub use decoder::{DecodeError, LogDecoder, Malformation, decode};
pub use forwarder::{EventForwarder, ForwardError, ForwardOutcome, Route, route};
pub use monitor::{
    BlockRange, ConstructionError, Monitor, MonitorConfig, MonitorState, MonitorStatus, ScanError,
    TickReport,
};
pub use scanner::{BlockRangeScanner, ScannedLogs};
