//! The RFQ and auction events emitted by the lending contracts.

use super::{FieldDescriptor, FieldType, SignatureRegistry};
use aqx_sdk::objects::EventKind;

use FieldType::{Address, Uint16, Uint256};

struct CatalogEntry {
    kind: EventKind,
    canonical: &'static str,
    fields: fn() -> Vec<FieldDescriptor>,
}

const CATALOG: &[CatalogEntry] = &[
    // RFQCreated(uint256 indexed rfqId, address indexed borrower, uint256 amount, uint256 duration)
    CatalogEntry {
        kind: EventKind::RfqCreated,
        canonical: "RFQCreated(uint256,address,uint256,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("rfq_id", Uint256, 1),
                FieldDescriptor::indexed("borrower", Address, 2),
                FieldDescriptor::data("amount", Uint256, 0),
                FieldDescriptor::data("duration", Uint256, 1),
            ]
        },
    },
    // QuoteSubmitted(uint256 indexed rfqId, address indexed lender, uint16 rateBps, uint256 limit)
    CatalogEntry {
        kind: EventKind::QuoteSubmitted,
        canonical: "QuoteSubmitted(uint256,address,uint16,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("rfq_id", Uint256, 1),
                FieldDescriptor::indexed("lender", Address, 2),
                FieldDescriptor::data("rate_bps", Uint16, 0),
                FieldDescriptor::data("limit", Uint256, 1),
            ]
        },
    },
    // QuoteAccepted(uint256 indexed rfqId, address indexed lender, uint256 quoteIndex)
    CatalogEntry {
        kind: EventKind::QuoteAccepted,
        canonical: "QuoteAccepted(uint256,address,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("rfq_id", Uint256, 1),
                FieldDescriptor::indexed("lender", Address, 2),
                FieldDescriptor::data("quote_index", Uint256, 0),
            ]
        },
    },
    // RFQExecuted(uint256 indexed rfqId, uint256 creditLineId)
    CatalogEntry {
        kind: EventKind::RfqExecuted,
        canonical: "RFQExecuted(uint256,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("rfq_id", Uint256, 1),
                FieldDescriptor::data("credit_line_id", Uint256, 0),
            ]
        },
    },
    // AuctionCreated(uint256 indexed auctionId, address indexed borrower, uint256 amount, uint256 endTime)
    CatalogEntry {
        kind: EventKind::AuctionCreated,
        canonical: "AuctionCreated(uint256,address,uint256,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("auction_id", Uint256, 1),
                FieldDescriptor::indexed("borrower", Address, 2),
                FieldDescriptor::data("amount", Uint256, 0),
                FieldDescriptor::data("end_time", Uint256, 1),
            ]
        },
    },
    // BidPlaced(uint256 indexed auctionId, address indexed lender, uint16 rateBps, uint256 limit)
    CatalogEntry {
        kind: EventKind::BidPlaced,
        canonical: "BidPlaced(uint256,address,uint16,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("auction_id", Uint256, 1),
                FieldDescriptor::indexed("lender", Address, 2),
                FieldDescriptor::data("rate_bps", Uint16, 0),
                FieldDescriptor::data("limit", Uint256, 1),
            ]
        },
    },
    // AuctionFinalized(uint256 indexed auctionId, address indexed winningLender)
    CatalogEntry {
        kind: EventKind::AuctionFinalized,
        canonical: "AuctionFinalized(uint256,address)",
        fields: || {
            vec![
                FieldDescriptor::indexed("auction_id", Uint256, 1),
                FieldDescriptor::indexed("winning_lender", Address, 2),
            ]
        },
    },
    // AuctionSettled(uint256 indexed auctionId, uint256 creditLineId)
    CatalogEntry {
        kind: EventKind::AuctionSettled,
        canonical: "AuctionSettled(uint256,uint256)",
        fields: || {
            vec![
                FieldDescriptor::indexed("auction_id", Uint256, 1),
                FieldDescriptor::data("credit_line_id", Uint256, 0),
            ]
        },
    },
];

pub(super) fn standard_registry() -> SignatureRegistry {
    let mut registry = SignatureRegistry::new();
    for entry in CATALOG {
        // Static table, checked by `test_catalog_registers_cleanly`.
        if let Err(e) = registry.register(entry.kind, entry.canonical, (entry.fields)()) {
            tracing::error!(error = %e, "Invalid built-in event signature");
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registers_cleanly() {
        let mut registry = SignatureRegistry::new();
        for entry in CATALOG {
            registry
                .register(entry.kind, entry.canonical, (entry.fields)())
                .unwrap();
        }
        for kind in EventKind::ALL {
            assert!(registry.hash_of(kind).is_some(), "{kind} missing");
        }
    }
}
