//! IPFS HTTP API responses and the NFT metadata document format.

use serde::{Deserialize, Serialize};

/// Response of `POST /api/v0/add`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IpfsAddResponse {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

impl IpfsAddResponse {
    /// Content URI in `ipfs://<cid>` form.
    pub fn uri(&self) -> String {
        format!("ipfs://{}", self.hash)
    }
}

/// Off-chain metadata JSON in the Metaplex token standard layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadataDocument {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub seller_fee_basis_points: u16,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
    pub properties: MetadataProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataProperties {
    pub category: String,
    pub files: Vec<MetadataFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub uri: String,
    #[serde(rename = "type")]
    pub mime: String,
}
