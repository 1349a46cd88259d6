//! SDK for the mint buffer replenisher.
//!
//! - [`objects`]: wire types for the approval pool, the headline feed, the
//!   image transform service, IPFS and Solana JSON-RPC.
//! - [`pubkey`] and [`transaction`]: the small subset of the Solana
//!   transaction format needed to submit Anchor instructions.
//! - [`client`]: typed HTTP / WebSocket clients (behind the `client` feature).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod pubkey;
pub mod transaction;
