//! In-memory fakes of the capability traits, shared by unit tests.

use crate::chain::{ChainError, ChainReader, RawLogRecord};
use crate::sinks::{PublishError, Publisher, Store, StoreError, StoreRow};
use alloy_primitives::{Address, B256, Bytes, U256};
use aqx_sdk::objects::{DecodedEvent, EventKind, Provenance};
use async_trait::async_trait;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct FakeChain {
    head: Mutex<Option<u64>>,
    logs: Mutex<Vec<RawLogRecord>>,
    failing: Mutex<HashSet<Address>>,
    ignore_range: AtomicBool,
    get_logs_calls: Mutex<Vec<(u64, u64, Address)>>,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        Self {
            head: Mutex::new(Some(head)),
            logs: Mutex::default(),
            failing: Mutex::default(),
            ignore_range: AtomicBool::new(false),
            get_logs_calls: Mutex::default(),
        }
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = Some(head);
    }

    pub fn fail_head(&self) {
        *self.head.lock().unwrap() = None;
    }

    pub fn push_log(&self, log: RawLogRecord) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn fail_logs_for(&self, address: Address) {
        self.failing.lock().unwrap().insert(address);
    }

    pub fn set_ignore_range(&self, ignore: bool) {
        self.ignore_range.store(ignore, Ordering::SeqCst);
    }

    /// `(from, to, address)` of every `get_logs` call, in call order.
    pub fn get_logs_calls(&self) -> Vec<(u64, u64, Address)> {
        self.get_logs_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn current_height(&self) -> Result<u64, ChainError> {
        self.head.lock().unwrap().ok_or(ChainError::Rpc {
            code: -32000,
            message: "node unavailable".into(),
        })
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        address: Address,
    ) -> Result<Vec<RawLogRecord>, ChainError> {
        self.get_logs_calls.lock().unwrap().push((from, to, address));
        if self.failing.lock().unwrap().contains(&address) {
            return Err(ChainError::Rpc {
                code: -32005,
                message: "limit exceeded".into(),
            });
        }
        let ignore_range = self.ignore_range.load(Ordering::SeqCst);
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.address == address)
            .filter(|log| ignore_range || (from..=to).contains(&log.block_number))
            .cloned()
            .collect())
    }
}

/// A log with the given signature hash, extra topics and data words.
pub fn encode_log(
    address: Address,
    signature: B256,
    topics: &[B256],
    words: &[u64],
    block_number: u64,
    log_index: u64,
) -> RawLogRecord {
    let mut all_topics = SmallVec::new();
    all_topics.push(signature);
    all_topics.extend(topics.iter().copied());

    let mut data = Vec::with_capacity(words.len() * 32);
    for word in words {
        data.extend_from_slice(B256::from(U256::from(*word)).as_slice());
    }

    RawLogRecord {
        address,
        topics: all_topics,
        data: Bytes::from(data),
        tx_hash: B256::from(U256::from(block_number) * U256::from(1000) + U256::from(log_index)),
        block_number,
        block_hash: B256::from(U256::from(block_number)),
        log_index,
    }
}

/// A log with only a signature topic and no data.
pub fn raw_log(address: Address, signature: B256, block_number: u64, log_index: u64) -> RawLogRecord {
    encode_log(address, signature, &[], &[], block_number, log_index)
}

/// A decoded event carrying the fields its store row needs.
pub fn sample_event(kind: EventKind, id: &str, block_number: u64, log_index: u64) -> DecodedEvent {
    let mut fields = BTreeMap::new();
    fields.insert(kind.entity().id_field().into(), id.to_owned());
    fields.insert("borrower".into(), Address::repeat_byte(0x0a).to_string());
    fields.insert("amount".into(), "500".to_owned());
    match kind {
        EventKind::RfqCreated => {
            fields.insert("duration".into(), "2592000".to_owned());
        }
        EventKind::AuctionCreated => {
            fields.insert("end_time".into(), "1700000000".to_owned());
        }
        _ => {}
    }
    DecodedEvent {
        kind,
        fields,
        provenance: Provenance {
            tx_hash: B256::from(U256::from(block_number) * U256::from(1000) + U256::from(log_index)).to_string(),
            block_number,
            block_hash: B256::from(U256::from(block_number)).to_string(),
            log_index,
            contract_address: Address::repeat_byte(0x01).to_string(),
        },
    }
}

/// Records published events; fails for events whose entity id is listed.
#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<(String, DecodedEvent)>>,
    fail_ids: HashSet<String>,
}

impl FakePublisher {
    pub fn failing_on<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            published: Mutex::default(),
            fail_ids: ids.into_iter().map(str::to_owned).collect(),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<DecodedEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, topic: &str, event: &DecodedEvent) -> Result<(), PublishError> {
        if event.entity_id().is_some_and(|id| self.fail_ids.contains(id)) {
            return Err(PublishError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "queue unavailable",
            ))));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), event.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<(String, StoreRow)>>,
    fail: bool,
}

impl FakeStore {
    pub fn failing() -> Self {
        Self {
            rows: Mutex::default(),
            fail: true,
        }
    }

    pub fn rows(&self) -> Vec<(String, StoreRow)> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn insert(&self, table: &str, row: StoreRow) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.rows.lock().unwrap().push((table.to_owned(), row));
        Ok(())
    }
}
