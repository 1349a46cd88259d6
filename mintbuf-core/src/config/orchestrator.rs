//! Orchestrator tuning.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of item pipelines running at once within a run.
    pub max_in_flight: usize,
    /// Category registered with every item (the on-chain `symbol`).
    pub category: String,
    /// Price used when a source supplies none, in basis points.
    pub default_price_bps: u16,
    /// Capacity of the bounded event queues.
    pub queue_capacity: usize,
    /// How long in-flight registrations may take to finish on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            category: "NEWS".to_string(),
            default_price_bps: 500,
            queue_capacity: 256,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}
