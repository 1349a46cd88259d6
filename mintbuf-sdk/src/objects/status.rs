//! Responses of the replenisher's read-only status API.
//!
//! - `GET /health`
//! - `GET /status` returns [`StatusResponse`]

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Latest decoded buffer state, if any notification has arrived.
    pub buffer: Option<BufferSnapshot>,
    /// Whether a replenishment run currently holds the single-flight slot.
    pub run_in_flight: bool,
    /// Summary of the most recently completed run.
    pub last_run: Option<RunSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub pending_count: u64,
    pub buffer_capacity: u64,
    pub low_water_mark: u64,
    /// Unix timestamp of the observation.
    pub observed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub request_id: Uuid,
    pub deficit: u64,
    pub sourced: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub started_at: i64,
    pub finished_at: i64,
}
