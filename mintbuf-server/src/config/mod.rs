//! Configuration module for mintbuf-server.
//!
//! Handles loading the TOML file, applying CLI overrides, validating every
//! external-service setting and loading the authority keypair. Any failure
//! here is fatal: the process does not start.

pub mod file;

use crate::config::file::{FileConfig, SourceConfig as FileSourceConfig};
use mintbuf_core::config::{
    GeneratedSourceConfig, LedgerConfig, OrchestratorConfig, PoolSourceConfig, PublisherConfig,
    ReplenisherConfig, SourceConfig,
};
use mintbuf_core::entities::item::{MAX_BASIS_POINTS, MAX_SYMBOL_LEN};
use mintbuf_sdk::objects::Commitment;
use mintbuf_sdk::pubkey::Pubkey;
use mintbuf_sdk::transaction::{Keypair, TransactionError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("failed to read keypair {path}: {source}")]
    KeypairRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid keypair {path}: {source}")]
    Keypair {
        path: PathBuf,
        source: TransactionError,
    },
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Server-only settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerSettings,
    pub replenisher: ReplenisherConfig,
    pub authority: Keypair,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate and convert to runtime config
    /// 4. Load the authority keypair
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        let authority = load_keypair(&file_config.ledger.keypair_path)?;
        let (server, replenisher) = build(file_config)?;
        Ok(LoadedConfig {
            server,
            replenisher,
            authority,
        })
    }
}

/// Read a JSON byte-array keypair file.
pub fn load_keypair(path: &Path) -> Result<Keypair, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::KeypairRead {
        path: path.to_path_buf(),
        source,
    })?;
    Keypair::from_json_array(&content).map_err(|source| ConfigError::Keypair {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate the file config and convert it to runtime config.
pub fn build(file: FileConfig) -> Result<(ServerSettings, ReplenisherConfig), ConfigError> {
    let ledger = LedgerConfig {
        rpc_url: parse_url("ledger.rpc_url", &file.ledger.rpc_url, &["http", "https"])?,
        ws_url: parse_url("ledger.ws_url", &file.ledger.ws_url, &["ws", "wss"])?,
        program_id: parse_pubkey("ledger.program_id", &file.ledger.program_id)?,
        state_account: parse_pubkey("ledger.state_account", &file.ledger.state_account)?,
        commitment: parse_commitment(&file.ledger.commitment)?,
        confirm_timeout: Duration::from_secs(file.ledger.confirm_timeout_secs),
        request_timeout: Duration::from_secs(file.ledger.request_timeout_secs.max(1)),
    };

    let o = file.orchestrator;
    if o.max_in_flight == 0 {
        return Err(invalid("orchestrator.max_in_flight must be at least 1"));
    }
    if o.queue_capacity == 0 {
        return Err(invalid("orchestrator.queue_capacity must be at least 1"));
    }
    if o.default_price_bps > MAX_BASIS_POINTS {
        return Err(invalid(format!(
            "orchestrator.default_price_bps {} exceeds {MAX_BASIS_POINTS}",
            o.default_price_bps
        )));
    }
    if o.category.is_empty() || o.category.len() > MAX_SYMBOL_LEN {
        return Err(invalid(format!(
            "orchestrator.category must be 1 to {MAX_SYMBOL_LEN} bytes"
        )));
    }
    let orchestrator = OrchestratorConfig {
        max_in_flight: o.max_in_flight,
        category: o.category,
        default_price_bps: o.default_price_bps,
        queue_capacity: o.queue_capacity,
        shutdown_grace: Duration::from_secs(o.shutdown_grace_secs),
    };

    let source = match file.source {
        FileSourceConfig::Pool { base_url, api_key } => SourceConfig::Pool(PoolSourceConfig {
            base_url: parse_url("source.base_url", &base_url, &["http", "https"])?,
            api_key: non_empty("source.api_key", api_key)?,
        }),
        FileSourceConfig::Generated {
            feed_url,
            feed_api_key,
            transform_url,
            transform_api_key,
            dedup_window,
            prompt_template,
            transform_parallelism,
        } => {
            if dedup_window == 0 {
                return Err(invalid("source.dedup_window must be at least 1"));
            }
            if transform_parallelism == 0 {
                return Err(invalid("source.transform_parallelism must be at least 1"));
            }
            SourceConfig::Generated(GeneratedSourceConfig {
                feed_url: parse_url("source.feed_url", &feed_url, &["http", "https"])?,
                feed_api_key: non_empty("source.feed_api_key", feed_api_key)?,
                transform_url: parse_url("source.transform_url", &transform_url, &["http", "https"])?,
                transform_api_key: non_empty("source.transform_api_key", transform_api_key)?,
                dedup_window,
                prompt_template,
                transform_parallelism,
            })
        }
    };

    let publisher = file
        .publisher
        .map(|p| {
            Ok::<_, ConfigError>(PublisherConfig {
                ipfs_api_url: parse_url("publisher.ipfs_api_url", &p.ipfs_api_url, &["http", "https"])?,
            })
        })
        .transpose()?;
    if source.needs_publisher() && publisher.is_none() {
        return Err(invalid(format!(
            "source kind \"{}\" requires a [publisher] section",
            source.kind()
        )));
    }

    Ok((
        ServerSettings {
            listen: file.server.listen,
        },
        ReplenisherConfig {
            ledger,
            orchestrator,
            source,
            publisher,
        },
    ))
}

fn parse_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    if raw.trim().is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    let url = Url::parse(raw).map_err(|e| invalid(format!("{field}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!(
            "{field}: scheme must be one of {}, got {}",
            schemes.join("/"),
            url.scheme()
        )));
    }
    Ok(url)
}

fn parse_pubkey(field: &str, raw: &str) -> Result<Pubkey, ConfigError> {
    raw.parse()
        .map_err(|e| invalid(format!("{field}: {e}")))
}

fn parse_commitment(raw: &str) -> Result<Commitment, ConfigError> {
    match raw {
        "processed" => Ok(Commitment::Processed),
        "confirmed" => Ok(Commitment::Confirmed),
        "finalized" => Ok(Commitment::Finalized),
        other => Err(invalid(format!(
            "ledger.commitment must be processed, confirmed or finalized, got {other}"
        ))),
    }
}

fn non_empty(field: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[ledger]
rpc_url = "http://127.0.0.1:8899"
ws_url = "ws://127.0.0.1:8900"
program_id = "11111111111111111111111111111111"
state_account = "SysvarRent111111111111111111111111111111111"
keypair_path = "id.json"
"#;

    fn parse(extra: &str) -> FileConfig {
        toml::from_str(&format!("{BASE}\n{extra}")).unwrap()
    }

    fn err(extra: &str) -> String {
        build(parse(extra)).unwrap_err().to_string()
    }

    const POOL: &str = r#"
[source]
kind = "pool"
base_url = "https://images.example.com"
api_key = "k"
"#;

    #[test]
    fn test_valid_pool_config() {
        let (server, config) = build(parse(POOL)).unwrap();
        assert_eq!(server.listen.port(), 8080);
        assert_eq!(config.source.kind(), "pool");
        assert_eq!(config.ledger.commitment, Commitment::Confirmed);
        assert_eq!(config.ledger.confirm_timeout, Duration::from_secs(60));
        assert_eq!(config.orchestrator.max_in_flight, 4);
        assert!(config.publisher.is_none());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let e = err(r#"
[source]
kind = "pool"
base_url = "https://images.example.com"
api_key = ""
"#);
        assert!(e.contains("source.api_key"), "{e}");
    }

    #[test]
    fn test_bad_scheme_rejected() {
        let e = err(r#"
[source]
kind = "pool"
base_url = "ftp://images.example.com"
api_key = "k"
"#);
        assert!(e.contains("scheme"), "{e}");
    }

    #[test]
    fn test_orchestrator_limits() {
        let e = err(&format!("{POOL}\n[orchestrator]\nmax_in_flight = 0\n"));
        assert!(e.contains("max_in_flight"), "{e}");
        let e = err(&format!("{POOL}\n[orchestrator]\ndefault_price_bps = 10001\n"));
        assert!(e.contains("default_price_bps"), "{e}");
    }

    #[test]
    fn test_generated_requires_publisher() {
        let generated = r#"
[source]
kind = "generated"
feed_url = "https://feed.example.com"
feed_api_key = "f"
transform_url = "https://gen.example.com"
transform_api_key = "t"
"#;
        let e = err(generated);
        assert!(e.contains("[publisher]"), "{e}");

        let with_publisher =
            format!("{generated}\n[publisher]\nipfs_api_url = \"http://127.0.0.1:5001\"\n");
        let (_, config) = build(parse(&with_publisher)).unwrap();
        assert!(config.publisher.is_some());
    }

    #[test]
    fn test_invalid_pubkey_rejected() {
        let toml_str = BASE.replace(
            "program_id = \"11111111111111111111111111111111\"",
            "program_id = \"not-base58!\"",
        );
        let file: FileConfig = toml::from_str(&format!("{toml_str}\n{POOL}")).unwrap();
        let e = build(file).unwrap_err().to_string();
        assert!(e.contains("ledger.program_id"), "{e}");
    }

    #[test]
    fn test_keypair_file() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("mintbuf-keypair-{}.json", std::process::id()));
        let seed = Keypair::from_seed(&[11; 32]).unwrap();
        let mut bytes = vec![11u8; 32];
        bytes.extend_from_slice(seed.pubkey().as_bytes());
        std::fs::write(&good, serde_json::to_string(&bytes).unwrap()).unwrap();
        assert_eq!(load_keypair(&good).unwrap().pubkey(), seed.pubkey());

        std::fs::write(&good, "[1, 2, 3]").unwrap();
        assert!(matches!(
            load_keypair(&good),
            Err(ConfigError::Keypair { .. })
        ));
        std::fs::remove_file(&good).unwrap();

        assert!(matches!(
            load_keypair(&dir.join("mintbuf-missing-keypair.json")),
            Err(ConfigError::KeypairRead { .. })
        ));
    }
}
