//! Event type definitions.
//!
//! Account notifications carry the full raw payload: the buffer state is
//! re-derived from every payload, never from a cached prior value.

use crate::entities::BufferState;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

/// Raw data of the monitored account after a write.
#[derive(Debug, Clone)]
pub struct AccountChanged {
    pub data: Bytes,
    /// Slot the notification was produced at, when known.
    pub slot: Option<u64>,
    pub received_at: OffsetDateTime,
}

impl AccountChanged {
    pub fn new(data: impl Into<Bytes>, slot: Option<u64>) -> Self {
        Self {
            data: data.into(),
            slot,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A decision to refill the buffer by `deficit` items.
///
/// Consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplenishmentRequest {
    pub deficit: u64,
    pub triggered_at: OffsetDateTime,
    pub request_id: Uuid,
}

impl ReplenishmentRequest {
    /// Returns `None` for a zero deficit.
    pub fn new(deficit: u64) -> Option<Self> {
        (deficit > 0).then(|| Self {
            deficit,
            triggered_at: OffsetDateTime::now_utc(),
            request_id: Uuid::now_v7(),
        })
    }
}

/// The latest decoded state of the buffer, published for readers such as
/// the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub state: BufferState,
    pub slot: Option<u64>,
    pub observed_at: OffsetDateTime,
}
