//! Configuration types for the replenisher.
//!
//! These types represent the validated runtime configuration injected into
//! the processors at construction. Loading and validating the TOML file is
//! handled by the server crate.

mod ledger;
mod orchestrator;
mod publisher;
mod source;

pub use ledger::LedgerConfig;
pub use orchestrator::OrchestratorConfig;
pub use publisher::PublisherConfig;
pub use source::{GeneratedSourceConfig, PoolSourceConfig, SourceConfig};

/// Everything the core processors need, minus the signing key.
#[derive(Debug, Clone)]
pub struct ReplenisherConfig {
    pub ledger: LedgerConfig,
    pub orchestrator: OrchestratorConfig,
    pub source: SourceConfig,
    /// Required when the generated source is selected.
    pub publisher: Option<PublisherConfig>,
}
