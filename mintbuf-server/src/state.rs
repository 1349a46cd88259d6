//! Application state shared across all request handlers.

use mintbuf_core::events::ObservationReceiver;
use mintbuf_core::processors::ReplenishmentOrchestrator;
use mintbuf_sdk::objects::{BufferSnapshot, RunSummary, StatusResponse};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Latest buffer observation published by the monitor.
    pub observation: ObservationReceiver,
    /// Handle used to report whether a run is in flight.
    pub orchestrator: ReplenishmentOrchestrator,
    /// Summary of the most recently completed run.
    pub last_run: Arc<RwLock<Option<RunSummary>>>,
}

impl AppState {
    pub fn new(observation: ObservationReceiver, orchestrator: ReplenishmentOrchestrator) -> Self {
        Self {
            observation,
            orchestrator,
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_run(&self, summary: RunSummary) {
        *self.last_run.write().await = Some(summary);
    }

    /// Snapshot for `GET /status`.
    pub async fn status(&self) -> StatusResponse {
        let buffer = (*self.observation.borrow()).map(|o| BufferSnapshot {
            pending_count: o.state.pending_count(),
            buffer_capacity: o.state.buffer_capacity(),
            low_water_mark: o.state.low_water_mark(),
            observed_at: o.observed_at.unix_timestamp(),
        });
        StatusResponse {
            buffer,
            run_in_flight: self.orchestrator.is_in_flight(),
            last_run: self.last_run.read().await.clone(),
        }
    }
}
