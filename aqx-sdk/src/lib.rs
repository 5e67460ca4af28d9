//! Shared wire types for the AQX contract event pipeline.
//!
//! Consumers of the queue and of the worker's websocket stream depend on
//! this crate alone; the `client` feature adds a websocket subscriber.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
