//! Event channel factories and handles.

use super::types::{AccountChanged, Observation, ReplenishmentRequest};
use crate::entities::RunReport;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Completed runs kept for lagging report subscribers.
pub const RUN_REPORT_BUFFER: usize = 16;

pub type AccountChangedSender = mpsc::Sender<AccountChanged>;
pub type AccountChangedReceiver = mpsc::Receiver<AccountChanged>;

pub type ReplenishmentRequestSender = mpsc::Sender<ReplenishmentRequest>;
pub type ReplenishmentRequestReceiver = mpsc::Receiver<ReplenishmentRequest>;

pub type ObservationSender = watch::Sender<Option<Observation>>;
pub type ObservationReceiver = watch::Receiver<Option<Observation>>;

pub type RunReportSender = broadcast::Sender<Arc<RunReport>>;
pub type RunReportReceiver = broadcast::Receiver<Arc<RunReport>>;

/// Create the bounded queue between the account listener and the monitor.
///
/// A full queue makes the listener wait, which is the backpressure.
pub fn account_changed_channel(capacity: usize) -> (AccountChangedSender, AccountChangedReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Create the bounded queue between the monitor and the orchestrator.
pub fn replenishment_request_channel(
    capacity: usize,
) -> (ReplenishmentRequestSender, ReplenishmentRequestReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Create the latest-observation slot.
pub fn observation_channel() -> (ObservationSender, ObservationReceiver) {
    watch::channel(None)
}

/// Create the run report broadcast.
pub fn run_report_channel() -> (RunReportSender, RunReportReceiver) {
    broadcast::channel(RUN_REPORT_BUFFER)
}
