//! Chain access.
//!
//! The pipeline reads the chain through the [`ChainReader`] capability
//! only: the current head height and the logs a single contract emitted
//! in an inclusive block range. [`JsonRpcChainReader`] is the
//! production implementation.

pub mod json_rpc;

pub use json_rpc::JsonRpcChainReader;

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use smallvec::SmallVec;
use thiserror::Error;

/// Errors that can occur while talking to the chain node.
#[derive(Debug, Error)]
pub enum ChainError {
    /// HTTP transport error
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A log record exactly as emitted by a contract.
///
/// `topics[0]` is the event signature hash for every non-anonymous event.
/// `(tx_hash, log_index)` identifies the record uniquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogRecord {
    pub address: Address,
    pub topics: SmallVec<[B256; 4]>,
    pub data: Bytes,
    pub tx_hash: B256,
    pub block_number: u64,
    pub block_hash: B256,
    pub log_index: u64,
}

impl RawLogRecord {
    /// The event signature hash, if the log has any topics.
    pub fn signature_hash(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// Read access to a chain node.
///
/// Cancellation is by dropping the returned future.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// The latest block height known to the node.
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// All logs emitted by `address` in blocks `from..=to`.
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        address: Address,
    ) -> Result<Vec<RawLogRecord>, ChainError>;
}
