//! Contracts the monitor watches.

use crate::signatures::SignatureRegistry;
use alloy_primitives::{Address, B256};
use aqx_sdk::objects::{EntityKind, EventKind};
use compact_str::CompactString;
use std::collections::HashSet;

/// A contract address together with the events it is expected to emit.
///
/// Immutable after construction. A log from this contract whose signature
/// hash is not in [`events`](WatchedContract::emits) is treated as
/// unrecognized, even if another contract's events know the hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedContract {
    name: CompactString,
    address: Address,
    events: HashSet<B256>,
}

impl WatchedContract {
    pub fn new(
        name: impl Into<CompactString>,
        address: Address,
        events: impl IntoIterator<Item = B256>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            events: events.into_iter().collect(),
        }
    }

    /// A contract emitting every registered event of one entity kind
    /// (the RFQ contract or the auction contract).
    pub fn for_entity(
        name: impl Into<CompactString>,
        address: Address,
        entity: EntityKind,
        registry: &SignatureRegistry,
    ) -> Self {
        let events = EventKind::ALL
            .into_iter()
            .filter(|kind| kind.entity() == entity)
            .filter_map(|kind| registry.hash_of(kind));
        Self::new(name, address, events)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether `hash` is one of this contract's event signatures.
    pub fn emits(&self, hash: &B256) -> bool {
        self.events.contains(hash)
    }
}
