//! Item source selection.

use url::Url;

/// Which acquisition strategy feeds the buffer.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// Pre-approved items from the private approval service.
    Pool(PoolSourceConfig),
    /// Items generated from a headline feed.
    Generated(GeneratedSourceConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Pool(_) => "pool",
            SourceConfig::Generated(_) => "generated",
        }
    }

    /// Whether items from this source must be published before registration.
    pub fn needs_publisher(&self) -> bool {
        matches!(self, SourceConfig::Generated(_))
    }
}

#[derive(Debug, Clone)]
pub struct PoolSourceConfig {
    pub base_url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedSourceConfig {
    pub feed_url: Url,
    pub feed_api_key: String,
    pub transform_url: Url,
    pub transform_api_key: String,
    /// How many recently delivered headlines are remembered for dedup.
    pub dedup_window: usize,
    /// Prompt sent to the transform service; `{headline}` is substituted.
    pub prompt_template: String,
    /// Number of transform requests issued concurrently per fetch.
    pub transform_parallelism: usize,
}
