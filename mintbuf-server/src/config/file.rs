//! TOML file configuration structures.
//!
//! These structs directly map to the `mintbuf.toml` file format. URLs and
//! keys are kept as strings here and validated by the loader.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub source: SourceConfig,
    pub publisher: Option<PublisherConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port of the status API (e.g., "127.0.0.1:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Ledger (cluster) section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub ws_url: String,
    /// Base58 program id.
    pub program_id: String,
    /// Base58 address of the monitored `State` account.
    pub state_account: String,
    /// JSON byte-array keypair of the buffer authority.
    pub keypair_path: PathBuf,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Orchestrator tuning section. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_in_flight: usize,
    pub category: String,
    pub default_price_bps: u16,
    pub queue_capacity: usize,
    pub shutdown_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let core = mintbuf_core::config::OrchestratorConfig::default();
        Self {
            max_in_flight: core.max_in_flight,
            category: core.category,
            default_price_bps: core.default_price_bps,
            queue_capacity: core.queue_capacity,
            shutdown_grace_secs: core.shutdown_grace.as_secs(),
        }
    }
}

/// Item source section, selected by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Pool {
        base_url: String,
        api_key: String,
    },
    Generated {
        feed_url: String,
        feed_api_key: String,
        transform_url: String,
        transform_api_key: String,
        #[serde(default = "default_dedup_window")]
        dedup_window: usize,
        #[serde(default = "default_prompt_template")]
        prompt_template: String,
        #[serde(default = "default_transform_parallelism")]
        transform_parallelism: usize,
    },
}

fn default_dedup_window() -> usize {
    1024
}

fn default_prompt_template() -> String {
    "Editorial illustration for the news headline: {headline}".to_string()
}

fn default_transform_parallelism() -> usize {
    2
}

/// Content storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub ipfs_api_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_parsing() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:3000"

[ledger]
rpc_url = "https://api.devnet.solana.com"
ws_url = "wss://api.devnet.solana.com"
program_id = "11111111111111111111111111111111"
state_account = "11111111111111111111111111111111"
keypair_path = "/etc/mintbuf/authority.json"

[orchestrator]
max_in_flight = 8

[source]
kind = "pool"
base_url = "https://images.example.com"
api_key = "secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.ledger.commitment, "confirmed");
        assert_eq!(config.ledger.confirm_timeout_secs, 60);
        assert_eq!(config.orchestrator.max_in_flight, 8);
        assert_eq!(config.orchestrator.category, "NEWS");
        assert_eq!(config.orchestrator.default_price_bps, 500);
        assert!(matches!(config.source, SourceConfig::Pool { .. }));
        assert!(config.publisher.is_none());
    }

    #[test]
    fn test_generated_config_defaults() {
        let toml_str = r#"
[ledger]
rpc_url = "http://127.0.0.1:8899"
ws_url = "ws://127.0.0.1:8900"
program_id = "11111111111111111111111111111111"
state_account = "11111111111111111111111111111111"
keypair_path = "id.json"
commitment = "finalized"

[source]
kind = "generated"
feed_url = "https://feed.example.com/headlines"
feed_api_key = "f"
transform_url = "https://gen.example.com/v1/images"
transform_api_key = "t"

[publisher]
ipfs_api_url = "http://127.0.0.1:5001"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        let SourceConfig::Generated {
            dedup_window,
            prompt_template,
            transform_parallelism,
            ..
        } = config.source
        else {
            panic!("expected generated source");
        };
        assert_eq!(dedup_window, 1024);
        assert!(prompt_template.contains("{headline}"));
        assert_eq!(transform_parallelism, 2);
        assert_eq!(config.publisher.unwrap().ipfs_api_url, "http://127.0.0.1:5001");
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let toml_str = r#"
[ledger]
rpc_url = "http://127.0.0.1:8899"
ws_url = "ws://127.0.0.1:8900"
program_id = "11111111111111111111111111111111"
state_account = "11111111111111111111111111111111"
keypair_path = "id.json"

[source]
kind = "scraper"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
