use super::{ItemSource, SourceError};
use crate::entities::{CandidateItem, ItemOrigin, RegisteredItem};
use async_trait::async_trait;
use mintbuf_sdk::client::PoolClient;
use mintbuf_sdk::objects::{ApprovedNft, NftStatus};
use tracing::{debug, instrument};

/// Pre-approved items reserved from the approval pool. Items arrive with a
/// final metadata URI, so they skip publication.
pub struct PoolSource {
    client: PoolClient,
    category: String,
    default_price_bps: u16,
}

impl PoolSource {
    pub fn new(client: PoolClient, category: impl Into<String>, default_price_bps: u16) -> Self {
        Self {
            client,
            category: category.into(),
            default_price_bps,
        }
    }

    fn to_candidate(&self, nft: ApprovedNft) -> CandidateItem {
        CandidateItem {
            raw_content: nft.id.to_string(),
            origin: ItemOrigin::Pool { id: nft.id },
            display_asset: None,
            metadata_uri: Some(nft.metadata_uri),
            name: nft.name,
            category: self.category.clone(),
            price_bps: nft
                .price
                .filter(|p| *p > 0)
                .unwrap_or(self.default_price_bps),
        }
    }
}

#[async_trait]
impl ItemSource for PoolSource {
    fn name(&self) -> &'static str {
        "pool"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, count: u64) -> Result<Vec<CandidateItem>, SourceError> {
        let mut batch = self.client.random_batch(count).await?;
        if batch.len() as u64 > count {
            debug!(returned = batch.len(), count, "pool over-delivered, truncating");
            batch.truncate(count as usize);
        }
        Ok(batch.into_iter().map(|nft| self.to_candidate(nft)).collect())
    }

    #[instrument(skip_all, fields(signature = %registered.signature))]
    async fn acknowledge(
        &self,
        item: &CandidateItem,
        registered: &RegisteredItem,
    ) -> Result<(), SourceError> {
        let ItemOrigin::Pool { id } = &item.origin else {
            return Ok(());
        };
        self.client.update_status(id, NftStatus::InBuffer).await?;
        Ok(())
    }
}
