#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod contracts;
pub mod framework;
pub mod processors;
pub mod signatures;
pub mod sinks;

#[cfg(test)]
mod test_support;
