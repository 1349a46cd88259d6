//! Content storage configuration.

use url::Url;

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// IPFS node API root, e.g. `http://localhost:5001`.
    pub ipfs_api_url: Url,
}
