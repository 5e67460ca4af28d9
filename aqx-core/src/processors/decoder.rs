//! Log decoder.
//!
//! Turns a [`RawLogRecord`] into a [`DecodedEvent`] using the fixed field
//! layout of its [`EventSignature`]:
//!
//! - indexed field N is read from `topics[N]`;
//! - non-indexed fields are read from their 32-byte word of the data
//!   payload, big-endian;
//! - `uint16` and `address` values occupy the low-order bytes of their word;
//! - integers are rendered as decimal strings, addresses as checksummed hex,
//!   raw words and hashes as lowercase hex.
//!
//! Decoding is pure. The only failure for a known signature is
//! [`DecodeError::Malformed`] (too few topics or too little data), which
//! callers treat as skip-and-log.

use crate::chain::RawLogRecord;
use crate::contracts::WatchedContract;
use crate::signatures::{EventSignature, FieldSource, FieldType, SignatureRegistry};
use alloy_primitives::{Address, B256, U256};
use aqx_sdk::objects::{DecodedEvent, EventKind, Provenance};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Why a log failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The log's signature is not one the emitting contract is watched for.
    /// Expected for events the pipeline does not care about.
    #[error("unrecognized event signature {0:?}")]
    NotFound(Option<B256>),

    /// The log matched a signature but does not carry enough topics or data.
    #[error("malformed {kind} log: {detail}")]
    Malformed { kind: EventKind, detail: Malformation },
}

/// What exactly was missing from a malformed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformation {
    #[error("expected at least {expected} topics, got {actual}")]
    TooFewTopics { expected: usize, actual: usize },

    #[error("expected at least {expected} data bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },
}

/// Decode `log` according to `signature`.
pub fn decode(log: &RawLogRecord, signature: &EventSignature) -> Result<DecodedEvent, DecodeError> {
    let malformed = |detail| DecodeError::Malformed {
        kind: signature.kind,
        detail,
    };

    let expected_topics = signature.required_topics();
    if log.topics.len() < expected_topics {
        return Err(malformed(Malformation::TooFewTopics {
            expected: expected_topics,
            actual: log.topics.len(),
        }));
    }
    let expected_data = signature.required_data_len();
    if log.data.len() < expected_data {
        return Err(malformed(Malformation::DataTooShort {
            expected: expected_data,
            actual: log.data.len(),
        }));
    }

    let mut fields = BTreeMap::new();
    for field in &signature.fields {
        // Lengths were checked above, so slot and range are in bounds.
        let word: &[u8] = match &field.source {
            FieldSource::Topic(slot) => log.topics[*slot].as_slice(),
            FieldSource::Data(range) => &log.data[range.clone()],
        };
        fields.insert(field.name.clone(), render_word(field.ty, word));
    }

    Ok(DecodedEvent {
        kind: signature.kind,
        fields,
        provenance: Provenance {
            tx_hash: log.tx_hash.to_string(),
            block_number: log.block_number,
            block_hash: log.block_hash.to_string(),
            log_index: log.log_index,
            contract_address: log.address.to_string(),
        },
    })
}

/// Render one 32-byte word as its wire string.
fn render_word(ty: FieldType, word: &[u8]) -> String {
    match ty {
        FieldType::Uint256 => U256::from_be_slice(word).to_string(),
        FieldType::Uint16 => u16::from_be_bytes([word[30], word[31]]).to_string(),
        FieldType::Address => Address::from_slice(&word[12..32]).to_string(),
        FieldType::Bytes => B256::from_slice(word).to_string(),
    }
}

/// Identifies and decodes logs against a shared [`SignatureRegistry`].
#[derive(Debug, Clone)]
pub struct LogDecoder {
    registry: Arc<SignatureRegistry>,
}

impl LogDecoder {
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Find the signature of `log` among the events `contract` emits and
    /// decode it.
    pub fn decode_log(
        &self,
        log: &RawLogRecord,
        contract: &WatchedContract,
    ) -> Result<DecodedEvent, DecodeError> {
        let hash = log.signature_hash();
        let signature = hash
            .filter(|hash| contract.emits(hash))
            .and_then(|hash| self.registry.lookup(hash))
            .ok_or(DecodeError::NotFound(hash.copied()))?;
        decode(log, signature)
    }
}
