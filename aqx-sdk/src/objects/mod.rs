pub mod events;
pub mod ws;

pub use events::{DecodedEvent, EntityKind, EventKind, Provenance};
pub use ws::{WsClientMessage, WsCloseCode, WsServerMessage};
