//! Monitor loop.
//!
//! The monitor owns the scan cursor (the next block to scan) and, on every
//! tick:
//! - reads the chain head;
//! - scans `[next, head]` for the logs of the watched contracts;
//! - decodes each log and forwards the resulting events in chain order;
//! - advances the cursor past the head.
//!
//! Failures are contained per tick. A head read failure aborts the tick and
//! leaves the cursor where it was; a failing contract, a malformed log or a
//! failed forward is logged and the tick carries on. Events of a failed
//! forward are not re-sent (at-least-once only within a tick).
//!
//! The cursor is kept in memory. A restarted monitor re-seeds from the head
//! (or the configured start height) and blocks produced while it was down are
//! not scanned.

use crate::chain::{ChainError, ChainReader};
use crate::contracts::WatchedContract;
use crate::processors::decoder::{DecodeError, LogDecoder};
use crate::processors::forwarder::EventForwarder;
use crate::processors::scanner::BlockRangeScanner;
use crate::signatures::SignatureRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// First block to scan. When unset, scanning starts after the head
    /// observed at construction.
    pub start_height: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            start_height: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("cannot read initial chain height: {0}")]
    Head(#[source] ChainError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read chain head: {0}")]
    Head(#[from] ChainError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Scanning,
    Decoding,
    Forwarding,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

/// Counters of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Head read at the start of the tick.
    pub head: u64,
    /// Scanned range, `None` when there were no new blocks.
    pub range: Option<BlockRange>,
    pub scanned: usize,
    pub decoded: usize,
    pub forwarded: usize,
    pub unrecognized: usize,
    pub malformed: usize,
    pub forward_failures: usize,
    pub failed_contracts: usize,
}

/// Snapshot of the monitor published after each state change.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    /// Highest fully scanned block, `None` before block 0 is scanned.
    pub cursor: Option<u64>,
    pub contracts: usize,
    pub last_tick: Option<TickReport>,
    pub last_error: Option<String>,
}

pub struct Monitor {
    reader: Arc<dyn ChainReader>,
    scanner: BlockRangeScanner,
    decoder: LogDecoder,
    forwarder: EventForwarder,
    contracts: Vec<WatchedContract>,
    poll_interval: Duration,
    next: u64,
    status_tx: watch::Sender<MonitorStatus>,
}

impl Monitor {
    /// Create a monitor and seed its cursor.
    ///
    /// Fails only when no start height is configured and the head cannot be
    /// read.
    pub async fn new(
        reader: Arc<dyn ChainReader>,
        registry: Arc<SignatureRegistry>,
        forwarder: EventForwarder,
        contracts: Vec<WatchedContract>,
        config: MonitorConfig,
    ) -> Result<Self, ConstructionError> {
        let next = match config.start_height {
            Some(start) => start,
            None => reader
                .current_height()
                .await
                .map_err(ConstructionError::Head)?
                .saturating_add(1),
        };
        let cursor = next.checked_sub(1);

        let (status_tx, _) = watch::channel(MonitorStatus {
            state: MonitorState::Idle,
            cursor,
            contracts: contracts.len(),
            last_tick: None,
            last_error: None,
        });

        info!(
            next,
            contracts = contracts.len(),
            poll_interval = ?config.poll_interval,
            "Monitor created"
        );

        Ok(Self {
            scanner: BlockRangeScanner::new(reader.clone()),
            reader,
            decoder: LogDecoder::new(registry),
            forwarder,
            contracts,
            poll_interval: config.poll_interval,
            next,
            status_tx,
        })
    }

    /// Highest fully scanned block, `None` while block 0 is still pending.
    pub fn cursor(&self) -> Option<u64> {
        self.next.checked_sub(1)
    }

    /// Receiver of status snapshots.
    pub fn status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    fn set_state(&self, state: MonitorState) {
        self.status_tx.send_modify(|status| status.state = state);
    }

    /// Run a single scan cycle.
    pub async fn tick(&mut self) -> Result<TickReport, ScanError> {
        let head = match self.reader.current_height().await {
            Ok(head) => head,
            Err(e) => {
                self.status_tx.send_modify(|status| {
                    status.state = MonitorState::Idle;
                    status.last_error = Some(e.to_string());
                });
                return Err(ScanError::Head(e));
            }
        };

        let mut report = TickReport {
            head,
            ..TickReport::default()
        };
        if head < self.next {
            debug!(head, next = self.next, "No new blocks");
            self.finish_tick(report.clone());
            return Ok(report);
        }

        let (from, to) = (self.next, head);
        report.range = Some(BlockRange { from, to });

        self.set_state(MonitorState::Scanning);
        let scanned = self.scanner.scan(from, to, &self.contracts).await;
        report.scanned = scanned.len();
        report.failed_contracts = scanned.failed_contracts.len();

        self.set_state(MonitorState::Decoding);
        let mut events = Vec::with_capacity(report.scanned);
        for (contract, log) in scanned.into_ordered() {
            match self.decoder.decode_log(&log, contract) {
                Ok(event) => events.push(event),
                Err(DecodeError::NotFound(hash)) => {
                    report.unrecognized += 1;
                    debug!(
                        contract = contract.name(),
                        signature = ?hash,
                        tx_hash = %log.tx_hash,
                        "Unrecognized event"
                    );
                }
                Err(e @ DecodeError::Malformed { .. }) => {
                    report.malformed += 1;
                    warn!(
                        contract = contract.name(),
                        tx_hash = %log.tx_hash,
                        log_index = log.log_index,
                        error = %e,
                        "Skipping malformed log"
                    );
                }
            }
        }
        report.decoded = events.len();

        self.set_state(MonitorState::Forwarding);
        for event in &events {
            match self.forwarder.forward(event).await {
                Ok(_) => report.forwarded += 1,
                Err(e) => {
                    report.forward_failures += 1;
                    error!(
                        error = %e,
                        tx_hash = %event.provenance.tx_hash,
                        log_index = event.provenance.log_index,
                        "Failed to forward event"
                    );
                }
            }
        }

        self.next = head.saturating_add(1);
        info!(
            from,
            to,
            scanned = report.scanned,
            forwarded = report.forwarded,
            "Processed block range"
        );
        self.finish_tick(report.clone());
        Ok(report)
    }

    fn finish_tick(&self, report: TickReport) {
        let cursor = self.cursor();
        self.status_tx.send_modify(|status| {
            status.state = MonitorState::Idle;
            status.cursor = cursor;
            status.last_tick = Some(report);
            status.last_error = None;
        });
    }

    /// Run ticks on the poll interval until shutdown is signaled.
    ///
    /// Shutdown is observed between ticks; a tick in progress always
    /// completes.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(next = self.next, "Monitor started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Monitor received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if let Err(e) = self.tick().await {
                        error!(error = %e, next = self.next, "Monitor tick failed");
                    }
                }
            }
        }

        self.set_state(MonitorState::Stopped);
        info!(next = self.next, "Monitor stopped");
    }
}
