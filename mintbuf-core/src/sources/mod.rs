//! Item acquisition strategies.
//!
//! Both strategies implement [`ItemSource`] and are selected by
//! configuration; the orchestrator never knows which one it drives.

mod generated;
mod pool;

pub use generated::{
    AssetTransformer, ContentWindow, GeneratedSource, GenerationError, HeadlineFeed, content_id,
};
pub use pool::PoolSource;

use crate::entities::{CandidateItem, RegisteredItem};
use async_trait::async_trait;
use mintbuf_sdk::client::ClientError;
use thiserror::Error;

/// Errors that end a fetch as a whole.
///
/// A short batch is not an error.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream service could not be reached or answered with an error.
    #[error("upstream error: {0}")]
    Upstream(#[from] ClientError),

    /// Every content unit of the fetch failed to generate.
    #[error("generation failed for every unit: {0}")]
    Generation(#[from] GenerationError),
}

/// Produces candidate items for registration.
///
/// Calls are independent: concurrent fetches never deliver the same item
/// twice, and no state is shared between calls beyond what guarantees that.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Return at most `count` items in delivery order.
    async fn fetch(&self, count: u64) -> Result<Vec<CandidateItem>, SourceError>;

    /// Tell the upstream that `item` is now registered. Best effort.
    async fn acknowledge(
        &self,
        _item: &CandidateItem,
        _registered: &RegisteredItem,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    /// Hand back an item that did not get registered, so a later fetch may
    /// deliver it again.
    fn release(&self, _item: &CandidateItem) {}
}
