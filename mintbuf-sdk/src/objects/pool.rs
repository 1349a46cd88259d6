//! Objects of the private approval pool service.
//!
//! - `GET  /api/events/current/nfts/random/{count}` returns `Vec<ApprovedNft>`
//! - `POST /api/nfts/{id}/status` takes a [`NftStatusUpdate`]

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of an approved item. The service has used both numeric and
/// string ids, so either is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NftId(pub String);

impl<'de> Deserialize<'de> for NftId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => NftId(s),
            Raw::Number(n) => NftId(n.to_string()),
        })
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pre-approved item reserved for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedNft {
    pub id: NftId,
    pub metadata_uri: String,
    pub name: String,
    /// Seller fee in basis points; absent or zero means "use the default".
    #[serde(default)]
    pub price: Option<u16>,
}

/// Lifecycle status reported back to the pool service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NftStatus {
    /// Registered in the on-chain buffer.
    InBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftStatusUpdate {
    pub status: NftStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_random_batch() {
        let json = r#"[
            {"id": 17, "metadataUri": "ipfs://a", "name": "First", "price": 750},
            {"id": "x-2", "metadataUri": "ipfs://b", "name": "Second"}
        ]"#;
        let items: Vec<ApprovedNft> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, NftId("17".into()));
        assert_eq!(items[0].price, Some(750));
        assert_eq!(items[1].id.to_string(), "x-2");
        assert_eq!(items[1].price, None);
    }

    #[test]
    fn test_status_update_wire_format() {
        let body = serde_json::to_string(&NftStatusUpdate {
            status: NftStatus::InBuffer,
        })
        .unwrap();
        assert_eq!(body, r#"{"status":"in_buffer"}"#);
    }
}
