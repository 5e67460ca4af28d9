//! HTTP JSON-RPC implementation of [`ChainReader`].
//!
//! Uses `eth_blockNumber` for the head height and `eth_getLogs` filtered by
//! a single contract address for log retrieval.

use super::{ChainError, ChainReader, RawLogRecord};
use alloy_primitives::{Address, B256, Bytes, U64};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Chain reader backed by a node's HTTP JSON-RPC endpoint.
pub struct JsonRpcChainReader {
    endpoint: Url,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcChainReader {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a reader for the node at `endpoint`.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            http_client: reqwest::Client::builder()
                .timeout(Self::REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The node endpoint this reader talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn current_height(&self) -> Result<u64, ChainError> {
        let height: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(height.to::<u64>())
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        address: Address,
    ) -> Result<Vec<RawLogRecord>, ChainError> {
        let filter = json!([{
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{to:#x}"),
            "address": address,
        }]);
        let logs: Vec<RpcLog> = self.call("eth_getLogs", filter).await?;

        debug!(%address, from, to, count = logs.len(), "Fetched logs");

        Ok(collect_records(address, logs))
    }
}

/// Convert the node's logs, skipping removed and unmined ones.
fn collect_records(address: Address, logs: Vec<RpcLog>) -> Vec<RawLogRecord> {
    let mut records = Vec::with_capacity(logs.len());
    for log in logs {
        if log.removed {
            warn!(
                %address,
                tx_hash = ?log.transaction_hash,
                "Node returned a removed log, ignoring"
            );
            continue;
        }
        let tx_hash = log.transaction_hash;
        match log.into_record() {
            Ok(record) => records.push(record),
            Err(e) => warn!(%address, ?tx_hash, error = %e, "Skipping incomplete log"),
        }
    }
    records
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T, ChainError> {
        if let Some(error) = self.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| ChainError::InvalidResponse("response has neither result nor error".into()))
    }
}

/// A log object as returned by `eth_getLogs`.
///
/// Block and transaction fields are nullable in the JSON-RPC schema
/// (pending logs); only mined logs are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    block_hash: Option<B256>,
    transaction_hash: Option<B256>,
    log_index: Option<U64>,
    #[serde(default)]
    removed: bool,
}

impl RpcLog {
    fn into_record(self) -> Result<RawLogRecord, ChainError> {
        let missing = |field: &str| ChainError::InvalidResponse(format!("log without {field}"));
        Ok(RawLogRecord {
            address: self.address,
            topics: self.topics.into_iter().collect(),
            data: self.data,
            tx_hash: self.transaction_hash.ok_or_else(|| missing("transactionHash"))?,
            block_number: self.block_number.ok_or_else(|| missing("blockNumber"))?.to::<u64>(),
            block_hash: self.block_hash.ok_or_else(|| missing("blockHash"))?,
            log_index: self.log_index.ok_or_else(|| missing("logIndex"))?.to::<u64>(),
        })
    }
}
