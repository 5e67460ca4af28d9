//! Event signature registry.
//!
//! Maps the topic hash found in `topics[0]` of a log to the event's
//! decoding rules. The topic hash is the keccak-256 hash of the canonical
//! signature text (`Name(type1,type2,...)`), which is the join key between
//! on-chain logs and the registry: a wrong type name or ordering silently
//! turns into an unrecognized event.
//!
//! The registry is built once at startup and passed explicitly to the
//! decoder and the monitor; it is never mutated afterwards.

mod catalog;

use alloy_primitives::{B256, keccak256};
use aqx_sdk::objects::EventKind;
use compact_str::CompactString;
use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

/// Width of one ABI word in bytes.
pub const WORD_SIZE: usize = 32;

/// Highest topic slot an indexed field can occupy (`topics[0]` is the
/// signature hash, leaving three slots).
pub const MAX_INDEXED_SLOT: usize = 3;

/// Compute the topic hash of a canonical event signature.
pub fn topic_hash(canonical: &str) -> B256 {
    keccak256(canonical.as_bytes())
}

/// Semantic type of a decoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Uint256,
    Uint16,
    Address,
    /// A raw 32-byte word, rendered as hex.
    Bytes,
}

impl FieldType {
    /// The type name as it appears in the canonical signature text.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            FieldType::Uint256 => "uint256",
            FieldType::Uint16 => "uint16",
            FieldType::Address => "address",
            FieldType::Bytes => "bytes32",
        }
    }
}

/// Where a field lives in the log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// `topics[slot]`, with `slot` in `1..=3`.
    Topic(usize),
    /// A byte range of the data payload.
    Data(Range<usize>),
}

/// Name, type, and location of one event field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: CompactString,
    pub ty: FieldType,
    pub source: FieldSource,
}

impl FieldDescriptor {
    /// A field stored in topic slot `slot`.
    pub fn indexed(name: &str, ty: FieldType, slot: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            source: FieldSource::Topic(slot),
        }
    }

    /// A field stored in the data payload at word index `word`.
    pub fn data(name: &str, ty: FieldType, word: usize) -> Self {
        let start = word * WORD_SIZE;
        Self {
            name: name.into(),
            ty,
            source: FieldSource::Data(start..start + WORD_SIZE),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.source, FieldSource::Topic(_))
    }
}

/// Decoding rules for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    pub kind: EventKind,
    pub canonical: CompactString,
    pub topic_hash: B256,
    pub fields: Vec<FieldDescriptor>,
}

impl EventSignature {
    /// Number of topics a matching log must carry, signature hash included.
    pub fn required_topics(&self) -> usize {
        1 + self.fields.iter().filter(|f| f.is_indexed()).count()
    }

    /// Minimum data payload length in bytes.
    pub fn required_data_len(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| match &f.source {
                FieldSource::Data(range) => Some(range.end),
                FieldSource::Topic(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Errors rejected at registration time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("malformed canonical signature: {0}")]
    MalformedSignature(String),

    #[error("{signature}: {declared} parameters declared but {described} fields described")]
    FieldCountMismatch {
        signature: String,
        declared: usize,
        described: usize,
    },

    #[error("{signature}: field {field} has type {expected} in the signature, not {described}")]
    TypeMismatch {
        signature: String,
        field: String,
        expected: String,
        described: &'static str,
    },

    #[error("{signature}: field {field} has an invalid layout: {reason}")]
    InvalidLayout {
        signature: String,
        field: String,
        reason: &'static str,
    },

    #[error("{0} is already registered")]
    Duplicate(String),
}

/// Lookup table from topic hash to [`EventSignature`].
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    by_hash: HashMap<B256, EventSignature>,
    by_kind: HashMap<EventKind, B256>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every RFQ and auction event the pipeline handles.
    pub fn standard() -> Self {
        catalog::standard_registry()
    }

    /// Register an event and return its topic hash.
    ///
    /// The field list must describe the canonical parameters in order:
    /// matching type names, topic slots `1, 2, …` for indexed fields and
    /// consecutive 32-byte data words starting at offset 0 for the rest.
    pub fn register(
        &mut self,
        kind: EventKind,
        canonical: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<B256, RegistryError> {
        let param_types = parse_param_types(canonical)?;
        validate_fields(canonical, &param_types, &fields)?;

        let hash = topic_hash(canonical);
        if self.by_hash.contains_key(&hash) {
            return Err(RegistryError::Duplicate(canonical.to_string()));
        }
        if self.by_kind.contains_key(&kind) {
            return Err(RegistryError::Duplicate(kind.to_string()));
        }

        self.by_kind.insert(kind, hash);
        self.by_hash.insert(
            hash,
            EventSignature {
                kind,
                canonical: canonical.into(),
                topic_hash: hash,
                fields,
            },
        );
        Ok(hash)
    }

    /// Find the signature whose topic hash is `hash`.
    pub fn lookup(&self, hash: &B256) -> Option<&EventSignature> {
        self.by_hash.get(hash)
    }

    /// Topic hash of a registered event kind.
    pub fn hash_of(&self, kind: EventKind) -> Option<B256> {
        self.by_kind.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventSignature> {
        self.by_hash.values()
    }
}

/// Split `Name(t1,t2,...)` into its parameter type names.
fn parse_param_types(canonical: &str) -> Result<Vec<&str>, RegistryError> {
    let malformed = || RegistryError::MalformedSignature(canonical.to_string());

    let (name, rest) = canonical.split_once('(').ok_or_else(malformed)?;
    let params = rest.strip_suffix(')').ok_or_else(malformed)?;
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || canonical.contains(char::is_whitespace)
    {
        return Err(malformed());
    }
    if params.is_empty() {
        return Ok(Vec::new());
    }
    let types: Vec<&str> = params.split(',').collect();
    if types.iter().any(|t| t.is_empty()) {
        return Err(malformed());
    }
    Ok(types)
}

fn validate_fields(
    canonical: &str,
    param_types: &[&str],
    fields: &[FieldDescriptor],
) -> Result<(), RegistryError> {
    if param_types.len() != fields.len() {
        return Err(RegistryError::FieldCountMismatch {
            signature: canonical.to_string(),
            declared: param_types.len(),
            described: fields.len(),
        });
    }

    let layout_error = |field: &FieldDescriptor, reason| RegistryError::InvalidLayout {
        signature: canonical.to_string(),
        field: field.name.to_string(),
        reason,
    };

    let mut next_slot = 1;
    let mut next_offset = 0;
    for (field, expected) in fields.iter().zip(param_types) {
        if field.ty.canonical_name() != *expected {
            return Err(RegistryError::TypeMismatch {
                signature: canonical.to_string(),
                field: field.name.to_string(),
                expected: expected.to_string(),
                described: field.ty.canonical_name(),
            });
        }

        match &field.source {
            FieldSource::Topic(slot) => {
                if *slot != next_slot {
                    return Err(layout_error(field, "topic slots must be 1, 2, 3 in order"));
                }
                if *slot > MAX_INDEXED_SLOT {
                    return Err(layout_error(field, "at most three fields can be indexed"));
                }
                next_slot += 1;
            }
            FieldSource::Data(range) => {
                if range.start != next_offset {
                    return Err(layout_error(
                        field,
                        "data words must be contiguous and ascending from offset 0",
                    ));
                }
                if range.len() != WORD_SIZE {
                    return Err(layout_error(field, "data fields occupy exactly one 32-byte word"));
                }
                next_offset = range.end;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_hash_matches_known_value() {
        // ERC-20 Transfer, the canonical example of the log-indexing scheme.
        assert_eq!(
            topic_hash("Transfer(address,address,uint256)").to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_signature_round_trip() {
        let registry = SignatureRegistry::standard();
        assert_eq!(registry.len(), EventKind::ALL.len());

        for signature in registry.iter() {
            let hash = topic_hash(&signature.canonical);
            assert_eq!(hash, topic_hash(&signature.canonical));
            assert_eq!(hash, signature.topic_hash);
            assert_eq!(registry.lookup(&hash), Some(signature));
            assert_eq!(registry.hash_of(signature.kind), Some(hash));
        }
    }

    #[test]
    fn test_register_returns_hash() {
        let mut registry = SignatureRegistry::new();
        let hash = registry
            .register(
                EventKind::RfqExecuted,
                "RFQExecuted(uint256,uint256)",
                vec![
                    FieldDescriptor::indexed("rfq_id", FieldType::Uint256, 1),
                    FieldDescriptor::data("credit_line_id", FieldType::Uint256, 0),
                ],
            )
            .unwrap();
        assert_eq!(hash, topic_hash("RFQExecuted(uint256,uint256)"));
        let signature = registry.lookup(&hash).unwrap();
        assert_eq!(signature.required_topics(), 2);
        assert_eq!(signature.required_data_len(), 32);
    }

    #[test]
    fn test_unknown_hash_is_not_found() {
        let registry = SignatureRegistry::standard();
        assert!(registry.lookup(&topic_hash("Unrelated(uint256)")).is_none());
    }

    #[test]
    fn test_overlapping_data_rejected() {
        let mut registry = SignatureRegistry::new();
        let result = registry.register(
            EventKind::RfqCreated,
            "RFQCreated(uint256,address,uint256,uint256)",
            vec![
                FieldDescriptor::indexed("rfq_id", FieldType::Uint256, 1),
                FieldDescriptor::indexed("borrower", FieldType::Address, 2),
                FieldDescriptor::data("amount", FieldType::Uint256, 0),
                FieldDescriptor::data("duration", FieldType::Uint256, 0),
            ],
        );
        assert!(matches!(result, Err(RegistryError::InvalidLayout { .. })));
    }

    #[test]
    fn test_unaligned_data_rejected() {
        let mut registry = SignatureRegistry::new();
        let result = registry.register(
            EventKind::RfqExecuted,
            "RFQExecuted(uint256,uint256)",
            vec![
                FieldDescriptor::indexed("rfq_id", FieldType::Uint256, 1),
                FieldDescriptor {
                    name: "credit_line_id".into(),
                    ty: FieldType::Uint256,
                    source: FieldSource::Data(30..62),
                },
            ],
        );
        assert!(matches!(result, Err(RegistryError::InvalidLayout { .. })));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut registry = SignatureRegistry::new();
        let result = registry.register(
            EventKind::QuoteAccepted,
            "QuoteAccepted(uint256,address,uint256)",
            vec![
                FieldDescriptor::indexed("rfq_id", FieldType::Uint256, 1),
                FieldDescriptor::indexed("lender", FieldType::Uint256, 2),
                FieldDescriptor::data("quote_index", FieldType::Uint256, 0),
            ],
        );
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));
    }

    #[test]
    fn test_field_count_mismatch_rejected() {
        let mut registry = SignatureRegistry::new();
        let result = registry.register(
            EventKind::AuctionFinalized,
            "AuctionFinalized(uint256,address)",
            vec![FieldDescriptor::indexed("auction_id", FieldType::Uint256, 1)],
        );
        assert!(matches!(result, Err(RegistryError::FieldCountMismatch { .. })));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = SignatureRegistry::standard();
        let result = registry.register(
            EventKind::AuctionSettled,
            "AuctionSettled(uint256,uint256)",
            vec![
                FieldDescriptor::indexed("auction_id", FieldType::Uint256, 1),
                FieldDescriptor::data("credit_line_id", FieldType::Uint256, 0),
            ],
        );
        assert!(matches!(result, Err(RegistryError::Duplicate(_))));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let mut registry = SignatureRegistry::new();
        for text in ["RFQExecuted", "RFQExecuted(uint256, uint256)", "(uint256)", "X(uint256,)"] {
            let result = registry.register(EventKind::RfqExecuted, text, vec![]);
            assert!(
                matches!(result, Err(RegistryError::MalformedSignature(_))),
                "{text} accepted"
            );
        }
    }
}
