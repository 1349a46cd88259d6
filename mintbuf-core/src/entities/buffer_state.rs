//! Decoding of the program's `State` account into a [`BufferState`].
//!
//! Layout (Anchor, Borsh):
//!
//! ```text
//! discriminator        [u8; 8]   sha256("account:State")[..8]
//! authority            Pubkey
//! buffer_size          u64
//! min_buffer_threshold u64
//! collection_mint      Pubkey
//! pending_nfts         Vec<PendingNft>   (u32 length prefix)
//! minted_count         u64
//! ```
//!
//! Anything after `minted_count` is account slack and ignored.

use borsh::{BorshDeserialize, BorshSerialize};
use mintbuf_sdk::pubkey::Pubkey;
use mintbuf_sdk::transaction::anchor_discriminator;
use thiserror::Error;

/// Anchor account name of the monitored account.
pub const STATE_ACCOUNT_NAME: &str = "State";

const DISCRIMINATOR_BYTES: usize = 8;

/// Errors produced while decoding the `State` account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("account data truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("account discriminator mismatch, not a {STATE_ACCOUNT_NAME} account")]
    Discriminator,

    /// The Borsh body is short or holds an invalid string or bool.
    #[error("malformed account body: {0}")]
    Malformed(String),

    #[error("buffer capacity is zero")]
    ZeroCapacity,

    #[error("low-water mark {low_water_mark} is not below capacity {buffer_capacity}")]
    ThresholdNotBelowCapacity {
        low_water_mark: u64,
        buffer_capacity: u64,
    },

    #[error("pending count {pending_count} exceeds capacity {buffer_capacity}")]
    PendingExceedsCapacity {
        pending_count: u64,
        buffer_capacity: u64,
    },
}

/// An item waiting in the on-chain buffer.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PendingNft {
    pub uri: String,
    pub name: String,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub minted: bool,
}

/// Full decoded contents of the `State` account, in field order.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StateAccount {
    pub authority: Pubkey,
    pub buffer_size: u64,
    pub min_buffer_threshold: u64,
    pub collection_mint: Pubkey,
    pub pending_nfts: Vec<PendingNft>,
    pub minted_count: u64,
}

impl StateAccount {
    /// Check the discriminator and decode the body. Bytes after
    /// `minted_count` are left unread.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < DISCRIMINATOR_BYTES {
            return Err(DecodeError::Truncated {
                needed: DISCRIMINATOR_BYTES,
                got: raw.len(),
            });
        }
        let (discriminator, mut body) = raw.split_at(DISCRIMINATOR_BYTES);
        if discriminator != anchor_discriminator("account", STATE_ACCOUNT_NAME) {
            return Err(DecodeError::Discriminator);
        }
        Self::deserialize(&mut body).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Anchor account bytes: discriminator followed by the Borsh body.
    pub fn encode(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut out = anchor_discriminator("account", STATE_ACCOUNT_NAME).to_vec();
        self.serialize(&mut out)?;
        Ok(out)
    }
}

/// Immutable snapshot of the buffer, recreated on every notification.
///
/// Invariants: `buffer_capacity > 0`, `low_water_mark < buffer_capacity`,
/// `pending_count <= buffer_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferState {
    pending_count: u64,
    buffer_capacity: u64,
    low_water_mark: u64,
}

impl BufferState {
    pub fn new(
        pending_count: u64,
        buffer_capacity: u64,
        low_water_mark: u64,
    ) -> Result<Self, DecodeError> {
        if buffer_capacity == 0 {
            return Err(DecodeError::ZeroCapacity);
        }
        if low_water_mark >= buffer_capacity {
            return Err(DecodeError::ThresholdNotBelowCapacity {
                low_water_mark,
                buffer_capacity,
            });
        }
        if pending_count > buffer_capacity {
            return Err(DecodeError::PendingExceedsCapacity {
                pending_count,
                buffer_capacity,
            });
        }
        Ok(Self {
            pending_count,
            buffer_capacity,
            low_water_mark,
        })
    }

    /// Decode raw account bytes. Pure: the same bytes always give the same
    /// state.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        Self::try_from(&StateAccount::decode(raw)?)
    }

    pub fn pending_count(&self) -> u64 {
        self.pending_count
    }

    pub fn buffer_capacity(&self) -> u64 {
        self.buffer_capacity
    }

    pub fn low_water_mark(&self) -> u64 {
        self.low_water_mark
    }

    /// The low-water-mark predicate.
    pub fn needs_replenishment(&self) -> bool {
        self.pending_count <= self.low_water_mark
    }

    /// Items missing to reach capacity, when the predicate holds.
    ///
    /// Always `> 0` when returned: `pending <= low_water_mark < capacity`.
    pub fn deficit(&self) -> Option<u64> {
        self.needs_replenishment()
            .then(|| self.buffer_capacity - self.pending_count)
    }
}

impl TryFrom<&StateAccount> for BufferState {
    type Error = DecodeError;

    fn try_from(account: &StateAccount) -> Result<Self, Self::Error> {
        BufferState::new(
            account.pending_nfts.len() as u64,
            account.buffer_size,
            account.min_buffer_threshold,
        )
    }
}

/// Account fixtures used by tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn encode_state(account: &StateAccount) -> Vec<u8> {
        account.encode().unwrap()
    }

    pub(crate) fn state_account(pending: u64, capacity: u64, threshold: u64) -> StateAccount {
        StateAccount {
            authority: Pubkey::new([1; 32]),
            buffer_size: capacity,
            min_buffer_threshold: threshold,
            collection_mint: Pubkey::new([2; 32]),
            pending_nfts: (0..pending)
                .map(|i| PendingNft {
                    uri: format!("ipfs://item-{i}"),
                    name: format!("Item {i}"),
                    symbol: "NEWS".into(),
                    seller_fee_basis_points: 500,
                    minted: false,
                })
                .collect(),
            minted_count: 7,
        }
    }

    pub(crate) fn encoded(pending: u64, capacity: u64, threshold: u64) -> Vec<u8> {
        encode_state(&state_account(pending, capacity, threshold))
    }
}
