#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod events;
pub mod ledger;
pub mod processors;
pub mod publisher;
pub mod sources;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
