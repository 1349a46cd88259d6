//! Items generated from a headline feed.
//!
//! Each headline is turned into an image by the transform service; the
//! result still has to be published before registration.

use super::{ItemSource, SourceError};
use crate::entities::item::{MAX_NAME_LEN, truncate_on_char_boundary};
use crate::entities::{CandidateItem, DisplayAsset, ItemOrigin};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use mintbuf_sdk::client::{ClientError, FeedClient, TransformClient};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, instrument, warn};

const DEFAULT_ASSET_MIME: &str = "image/png";

/// Failure to turn one content unit into an asset. Drops that unit only.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("transform request failed: {0}")]
    Transform(#[from] ClientError),

    #[error("transform service returned an empty asset")]
    EmptyAsset,
}

/// Source of raw content units.
#[async_trait]
pub trait HeadlineFeed: Send + Sync {
    async fn headlines(&self) -> Result<Vec<String>, ClientError>;
}

/// Turns a prompt into a binary asset and its MIME type.
#[async_trait]
pub trait AssetTransformer: Send + Sync {
    async fn transform(&self, prompt: &str) -> Result<(Bytes, Option<String>), ClientError>;
}

#[async_trait]
impl HeadlineFeed for FeedClient {
    async fn headlines(&self) -> Result<Vec<String>, ClientError> {
        FeedClient::headlines(self).await
    }
}

#[async_trait]
impl AssetTransformer for TransformClient {
    async fn transform(&self, prompt: &str) -> Result<(Bytes, Option<String>), ClientError> {
        TransformClient::transform(self, prompt).await
    }
}

/// Hex SHA-256 of the trimmed content.
pub fn content_id(content: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, content.trim().as_bytes());
    digest
        .as_ref()
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Bounded FIFO of recently claimed content ids.
///
/// `claim` is an atomic insert-if-absent, so two concurrent fetches can
/// never both obtain the same id.
#[derive(Debug)]
pub struct ContentWindow {
    capacity: usize,
    inner: Mutex<WindowInner>,
}

#[derive(Debug, Default)]
struct WindowInner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl ContentWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(WindowInner::default()),
        }
    }

    /// Returns `false` if `id` is already claimed.
    pub fn claim(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.seen.contains(id) {
            return false;
        }
        if inner.order.len() >= self.capacity
            && let Some(evicted) = inner.order.pop_front()
        {
            inner.seen.remove(&evicted);
        }
        inner.seen.insert(id.to_string());
        inner.order.push_back(id.to_string());
        true
    }

    /// Give a claim back so the content can be retried by a later fetch.
    pub fn release(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.seen.remove(id) {
            inner.order.retain(|claimed| claimed != id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct GeneratedSource<F, T> {
    feed: F,
    transformer: T,
    window: ContentWindow,
    prompt_template: String,
    category: String,
    price_bps: u16,
    parallelism: usize,
}

impl<F: HeadlineFeed, T: AssetTransformer> GeneratedSource<F, T> {
    pub fn new(
        feed: F,
        transformer: T,
        dedup_window: usize,
        prompt_template: impl Into<String>,
        category: impl Into<String>,
        price_bps: u16,
    ) -> Self {
        Self {
            feed,
            transformer,
            window: ContentWindow::new(dedup_window),
            prompt_template: prompt_template.into(),
            category: category.into(),
            price_bps,
            parallelism: 1,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    fn prompt(&self, headline: &str) -> String {
        self.prompt_template.replace("{headline}", headline)
    }

    async fn generate(
        &self,
        headline: String,
        content_id: String,
    ) -> Result<CandidateItem, (String, GenerationError)> {
        let result = self.transformer.transform(&self.prompt(&headline)).await;
        let (bytes, mime) = match result {
            Ok((bytes, _)) if bytes.is_empty() => {
                return Err((content_id, GenerationError::EmptyAsset));
            }
            Ok(asset) => asset,
            Err(e) => return Err((content_id, e.into())),
        };
        Ok(CandidateItem {
            name: truncate_on_char_boundary(&headline, MAX_NAME_LEN)
                .trim_end()
                .to_string(),
            origin: ItemOrigin::Generated { content_id },
            raw_content: headline,
            display_asset: Some(DisplayAsset {
                bytes,
                mime: mime.unwrap_or_else(|| DEFAULT_ASSET_MIME.to_string()),
            }),
            metadata_uri: None,
            category: self.category.clone(),
            price_bps: self.price_bps,
        })
    }
}

#[async_trait]
impl<F: HeadlineFeed, T: AssetTransformer> ItemSource for GeneratedSource<F, T> {
    fn name(&self) -> &'static str {
        "generated"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, count: u64) -> Result<Vec<CandidateItem>, SourceError> {
        let headlines = self.feed.headlines().await?;

        let mut claimed = Vec::new();
        for headline in headlines {
            if claimed.len() as u64 >= count {
                break;
            }
            let headline = headline.trim().to_string();
            if headline.is_empty() {
                continue;
            }
            let id = content_id(&headline);
            if self.window.claim(&id) {
                claimed.push((headline, id));
            } else {
                debug!(content_id = %id, "duplicate content skipped");
            }
        }

        let results: Vec<_> = stream::iter(claimed)
            .map(|(headline, id)| self.generate(headline, id))
            .buffered(self.parallelism)
            .collect()
            .await;

        let mut items = Vec::with_capacity(results.len());
        let mut last_error = None;
        for result in results {
            match result {
                Ok(item) => items.push(item),
                Err((id, e)) => {
                    warn!(content_id = %id, error = %e, "generation failed, dropping unit");
                    self.window.release(&id);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if items.is_empty() => Err(SourceError::Generation(e)),
            _ => Ok(items),
        }
    }

    fn release(&self, item: &CandidateItem) {
        if let ItemOrigin::Generated { content_id } = &item.origin {
            debug!(%content_id, "releasing unregistered content");
            self.window.release(content_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFeed, FakeTransformer};
    use std::sync::Arc;

    fn source(
        headlines: &[&str],
        failing: &[&str],
    ) -> GeneratedSource<FakeFeed, FakeTransformer> {
        GeneratedSource::new(
            FakeFeed::new(headlines),
            FakeTransformer::failing_on(failing),
            64,
            "Illustrate: {headline}",
            "NEWS",
            500,
        )
        .with_parallelism(3)
    }

    #[test]
    fn test_content_id_is_stable_hex() {
        let id = content_id("  Markets rally ");
        assert_eq!(id.len(), 64);
        assert_eq!(id, content_id("Markets rally"));
        assert_ne!(id, content_id("Markets fall"));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let window = ContentWindow::new(2);
        assert!(window.claim("a"));
        assert!(window.claim("b"));
        assert!(!window.claim("a"));
        assert!(window.claim("c"));
        assert_eq!(window.len(), 2);
        // "a" was evicted by "c".
        assert!(window.claim("a"));
        window.release("a");
        assert!(window.claim("a"));
    }

    #[tokio::test]
    async fn test_fetch_builds_items_in_feed_order() {
        let s = source(&["One", "Two", "Three"], &[]);
        let items = s.fetch(2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_content, "One");
        assert_eq!(items[1].raw_content, "Two");
        assert!(items.iter().all(|i| i.needs_publication()));
        let asset = items[0].display_asset.as_ref().unwrap();
        assert_eq!(asset.mime, "image/png");
        let mut prompts = s.transformer.prompts();
        prompts.sort();
        assert_eq!(prompts, ["Illustrate: One", "Illustrate: Two"]);
    }

    #[tokio::test]
    async fn test_failed_unit_is_dropped_and_released() {
        let s = source(&["One", "Two", "Three"], &["Illustrate: Two"]);
        let items = s.fetch(3).await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.raw_content.as_str()).collect();
        assert_eq!(names, ["One", "Three"]);
        // The failed unit can be claimed again later.
        assert!(s.window.claim(&content_id("Two")));
    }

    #[tokio::test]
    async fn test_released_item_is_fetched_again() {
        let s = source(&["One", "Two"], &[]);
        let first = s.fetch(2).await.unwrap();
        assert!(s.fetch(2).await.unwrap().is_empty());

        s.release(&first[0]);
        let again = s.fetch(2).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].raw_content, "One");
        assert_eq!(again[0].origin, first[0].origin);
    }

    #[tokio::test]
    async fn test_every_unit_failing_is_a_source_error() {
        let s = source(&["One"], &["Illustrate: One"]);
        assert!(matches!(
            s.fetch(1).await,
            Err(SourceError::Generation(GenerationError::Transform(_)))
        ));
    }

    #[tokio::test]
    async fn test_duplicates_filtered_within_and_across_fetches() {
        let s = Arc::new(source(&["Same", "Same", "Other"], &[]));
        let (a, b) = tokio::join!(s.fetch(3), s.fetch(3));
        let mut all: Vec<_> = a
            .unwrap()
            .into_iter()
            .chain(b.unwrap())
            .map(|i| i.raw_content)
            .collect();
        all.sort();
        assert_eq!(all, ["Other", "Same"]);
    }

    #[tokio::test]
    async fn test_long_headline_name_truncated() {
        let long = "A headline that is definitely longer than thirty-two bytes";
        let s = source(&[long], &[]);
        let items = s.fetch(1).await.unwrap();
        assert!(items[0].name.len() <= MAX_NAME_LEN);
        assert!(long.starts_with(&items[0].name));
        assert_eq!(items[0].raw_content, long);
        assert!(items[0].validate().is_ok());
    }
}
