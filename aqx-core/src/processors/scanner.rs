//! Block range scanner.
//!
//! Fetches the logs of every watched contract for an inclusive block range,
//! one `get_logs` call per contract, and merges the per-contract lists into a
//! single sequence ordered by `(block_number, log_index)`.

use crate::chain::{ChainReader, RawLogRecord};
use crate::contracts::WatchedContract;
use compact_str::CompactString;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, warn};

/// Logs of one scan, grouped by contract until consumed.
pub struct ScannedLogs<'a> {
    pub from: u64,
    pub to: u64,
    /// Contracts whose `get_logs` call failed. Their logs for this range are
    /// not retried.
    pub failed_contracts: Vec<CompactString>,
    per_contract: Vec<(&'a WatchedContract, Vec<RawLogRecord>)>,
}

impl<'a> ScannedLogs<'a> {
    fn empty(from: u64, to: u64) -> Self {
        Self {
            from,
            to,
            failed_contracts: Vec::new(),
            per_contract: Vec::new(),
        }
    }

    /// Total number of logs.
    pub fn len(&self) -> usize {
        self.per_contract.iter().map(|(_, logs)| logs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the logs in `(block_number, log_index)` order, each paired with
    /// the contract it was fetched for.
    pub fn into_ordered(self) -> impl Iterator<Item = (&'a WatchedContract, RawLogRecord)> {
        self.per_contract
            .into_iter()
            .map(|(contract, mut logs)| {
                // kmerge needs each input sorted.
                logs.sort_by_key(|log| (log.block_number, log.log_index));
                logs.into_iter().map(move |log| (contract, log))
            })
            .kmerge_by(|(_, a), (_, b)| (a.block_number, a.log_index) < (b.block_number, b.log_index))
    }
}

pub struct BlockRangeScanner {
    reader: Arc<dyn ChainReader>,
}

impl BlockRangeScanner {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Scan `[from, to]` for the logs of `contracts`.
    ///
    /// A contract whose request fails is logged and listed in
    /// [`ScannedLogs::failed_contracts`]; the other contracts are unaffected.
    pub async fn scan<'a>(
        &self,
        from: u64,
        to: u64,
        contracts: &'a [WatchedContract],
    ) -> ScannedLogs<'a> {
        let mut scanned = ScannedLogs::empty(from, to);
        if to < from {
            return scanned;
        }

        for contract in contracts {
            let address = contract.address();
            let logs = match self.reader.get_logs(from, to, address).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(
                        contract = contract.name(),
                        %address,
                        from,
                        to,
                        error = %e,
                        "Failed to fetch logs"
                    );
                    scanned.failed_contracts.push(contract.name().into());
                    continue;
                }
            };

            let fetched = logs.len();
            let logs: Vec<_> = logs
                .into_iter()
                .filter(|log| {
                    if log.address != address {
                        warn!(
                            contract = contract.name(),
                            expected = %address,
                            actual = %log.address,
                            "Node returned a log for another address, dropping"
                        );
                        return false;
                    }
                    if !(from..=to).contains(&log.block_number) {
                        warn!(
                            contract = contract.name(),
                            block_number = log.block_number,
                            from,
                            to,
                            "Node returned a log outside the requested range, dropping"
                        );
                        return false;
                    }
                    true
                })
                .collect();

            debug!(contract = contract.name(), fetched, kept = logs.len(), "Scanned contract");
            scanned.per_contract.push((contract, logs));
        }

        scanned
    }
}
