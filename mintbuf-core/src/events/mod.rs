//! Event system.
//!
//! # Event Flow
//!
//! 1. `AccountListener` emits `AccountChanged` -> `BufferMonitor`
//! 2. `BufferMonitor` publishes an `Observation` and, when the buffer is at
//!    or below its low-water mark, emits `ReplenishmentRequest` ->
//!    `ReplenishmentOrchestrator`
//! 3. `ReplenishmentOrchestrator` broadcasts a `RunReport` per completed run

pub mod channels;
pub mod types;

pub use channels::{
    AccountChangedReceiver, AccountChangedSender, DEFAULT_CHANNEL_BUFFER, ObservationReceiver,
    ObservationSender, ReplenishmentRequestReceiver, ReplenishmentRequestSender,
    RUN_REPORT_BUFFER, RunReportReceiver, RunReportSender, account_changed_channel,
    observation_channel, replenishment_request_channel, run_report_channel,
};
pub use types::{AccountChanged, Observation, ReplenishmentRequest};
