//! Content-addressed publication of assets and metadata.

use crate::entities::CandidateItem;
use async_trait::async_trait;
use mintbuf_sdk::client::{ClientError, IpfsClient};
use mintbuf_sdk::objects::{MetadataAttribute, MetadataFile, MetadataProperties, NftMetadataDocument};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur while publishing content.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Storage I/O or timeout.
    #[error("storage error: {0}")]
    Storage(#[from] ClientError),

    #[error("metadata serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The item needs publication but carries no asset.
    #[error("item has neither a metadata URI nor an asset to publish")]
    MissingAsset,

    /// The item needs publication but no publisher is configured.
    #[error("no asset publisher configured")]
    NoPublisher,
}

/// Pins content to durable content-addressed storage.
///
/// Both operations return a URI of the form `scheme://<content-id>`.
/// Idempotency of repeated writes is the storage system's concern.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    async fn publish_bytes(&self, data: Vec<u8>, mime: &str) -> Result<String, PublishError>;

    async fn publish_json(&self, json: String) -> Result<String, PublishError>;
}

/// [`AssetPublisher`] backed by an IPFS node's HTTP API.
#[derive(Debug, Clone)]
pub struct IpfsPublisher {
    client: IpfsClient,
}

impl IpfsPublisher {
    pub fn new(client: IpfsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetPublisher for IpfsPublisher {
    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn publish_bytes(&self, data: Vec<u8>, mime: &str) -> Result<String, PublishError> {
        let resp = self.client.add(data, "asset", mime).await?;
        Ok(resp.uri())
    }

    #[instrument(skip(self, json), fields(len = json.len()))]
    async fn publish_json(&self, json: String) -> Result<String, PublishError> {
        let resp = self
            .client
            .add(json.into_bytes(), "metadata.json", "application/json")
            .await?;
        Ok(resp.uri())
    }
}

/// Build the metadata document for an item whose asset lives at `image_uri`.
pub fn metadata_document(item: &CandidateItem, image_uri: &str, mime: &str) -> NftMetadataDocument {
    NftMetadataDocument {
        name: item.name.clone(),
        symbol: item.category.clone(),
        description: item.raw_content.clone(),
        image: image_uri.to_string(),
        seller_fee_basis_points: item.price_bps,
        attributes: vec![MetadataAttribute {
            trait_type: "category".to_string(),
            value: item.category.clone(),
        }],
        properties: MetadataProperties {
            category: "image".to_string(),
            files: vec![MetadataFile {
                uri: image_uri.to_string(),
                mime: mime.to_string(),
            }],
        },
    }
}

/// Publish the item's asset, then its metadata document, and set
/// `metadata_uri`.
pub async fn publish_candidate(
    publisher: &dyn AssetPublisher,
    item: &mut CandidateItem,
) -> Result<String, PublishError> {
    let asset = item.display_asset.as_ref().ok_or(PublishError::MissingAsset)?;
    let image_uri = publisher
        .publish_bytes(asset.bytes.to_vec(), &asset.mime)
        .await?;
    debug!(image_uri = %image_uri, "asset published");

    let document = metadata_document(item, &image_uri, &asset.mime);
    let json = serde_json::to_string(&document)?;
    let metadata_uri = publisher.publish_json(json).await?;
    debug!(metadata_uri = %metadata_uri, "metadata published");

    item.metadata_uri = Some(metadata_uri.clone());
    Ok(metadata_uri)
}
