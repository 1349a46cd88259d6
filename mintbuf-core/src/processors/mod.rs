//! Event processors.
//!
//! - `AccountListener`: holds the account subscription, emits `AccountChanged`
//! - `BufferMonitor`: receives `AccountChanged`, emits `ReplenishmentRequest`
//! - `ReplenishmentOrchestrator`: receives `ReplenishmentRequest`, drives
//!   runs, broadcasts `RunReport`

pub mod account_listener;
pub mod buffer_monitor;
pub mod orchestrator;
pub mod single_flight;

pub use account_listener::AccountListener;
pub use buffer_monitor::{BufferMonitor, MonitorError, evaluate, on_account_change};
pub use orchestrator::{ReplenishmentOrchestrator, SubmitOutcome};
pub use single_flight::SingleFlight;
