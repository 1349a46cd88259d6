//! In-memory collaborators for tests.

use crate::entities::{BufferState, CandidateItem, DisplayAsset, ItemOrigin, RegisteredItem};
use crate::ledger::{LedgerClient, LedgerError, Registration, SubmissionError, SubmissionErrorKind};
use crate::publisher::{AssetPublisher, PublishError};
use crate::sources::{AssetTransformer, HeadlineFeed, ItemSource, SourceError};
use async_trait::async_trait;
use bytes::Bytes;
use mintbuf_sdk::client::ClientError;
use mintbuf_sdk::objects::NftId;
use mintbuf_sdk::transaction::{Keypair, TxSignature};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeItemKind {
    /// Carries a metadata URI and requires acknowledgement.
    Pool,
    /// Carries an asset and needs publication.
    Generated,
}

/// Returns up to `supply` items named `Item 1..=n` per fetch.
pub struct FakeSource {
    kind: FakeItemKind,
    supply: AtomicUsize,
    oversupply: bool,
    fail: AtomicBool,
    fail_acks: AtomicBool,
    gate: Option<Semaphore>,
    entered: Notify,
    requested: Mutex<Vec<u64>>,
    acknowledged: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeSource {
    pub fn new(kind: FakeItemKind, supply: usize) -> Self {
        Self {
            kind,
            supply: AtomicUsize::new(supply),
            oversupply: false,
            fail: AtomicBool::new(false),
            fail_acks: AtomicBool::new(false),
            gate: None,
            entered: Notify::new(),
            requested: Mutex::new(Vec::new()),
            acknowledged: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every fetch waits for a permit from [`FakeSource::open_gate`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Every fetch returns the whole supply, ignoring the requested count.
    pub fn oversupplying(mut self) -> Self {
        self.oversupply = true;
        self
    }

    pub fn open_gate(&self, fetches: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(fetches);
        }
    }

    /// Resolves once a fetch has started (one permit per fetch).
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_failing_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    pub fn requested(&self) -> Vec<u64> {
        lock(&self.requested).clone()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        lock(&self.acknowledged).clone()
    }

    pub fn released(&self) -> Vec<String> {
        lock(&self.released).clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn item(&self, n: usize) -> CandidateItem {
        let name = format!("Item {n}");
        match self.kind {
            FakeItemKind::Pool => CandidateItem {
                origin: ItemOrigin::Pool {
                    id: NftId(n.to_string()),
                },
                raw_content: n.to_string(),
                display_asset: None,
                metadata_uri: Some(format!("ipfs://pool-{n}")),
                name,
                category: "NEWS".into(),
                price_bps: 500,
            },
            FakeItemKind::Generated => CandidateItem {
                origin: ItemOrigin::Generated {
                    content_id: format!("content-{n}"),
                },
                raw_content: format!("Headline {n}"),
                display_asset: Some(DisplayAsset {
                    bytes: Bytes::from(format!("asset:{name}")),
                    mime: "image/png".into(),
                }),
                metadata_uri: None,
                name,
                category: "NEWS".into(),
                price_bps: 500,
            },
        }
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, count: u64) -> Result<Vec<CandidateItem>, SourceError> {
        lock(&self.requested).push(count);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::Upstream(ClientError::Subscription(
                "source unreachable".into(),
            )));
        }
        let supply = self.supply.load(Ordering::SeqCst);
        let n = if self.oversupply {
            supply
        } else {
            (count as usize).min(supply)
        };
        Ok((1..=n).map(|i| self.item(i)).collect())
    }

    async fn acknowledge(
        &self,
        item: &CandidateItem,
        _registered: &RegisteredItem,
    ) -> Result<(), SourceError> {
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(SourceError::Upstream(ClientError::EmptyResult));
        }
        lock(&self.acknowledged).push(item.name.clone());
        Ok(())
    }

    fn release(&self, item: &CandidateItem) {
        lock(&self.released).push(item.name.clone());
    }
}

/// Hands out `ipfs://fake-{n}` URIs. Assets whose bytes equal
/// `asset:{name}` for a failing name are rejected.
#[derive(Default)]
pub struct FakePublisher {
    next: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    published: Mutex<Vec<(Vec<u8>, String)>>,
}

impl FakePublisher {
    pub fn failing_on(names: &[&str]) -> Self {
        let publisher = Self::default();
        lock(&publisher.failing).extend(names.iter().map(|n| format!("asset:{n}")));
        publisher
    }

    pub fn published(&self) -> Vec<(Vec<u8>, String)> {
        lock(&self.published).clone()
    }

    fn store(&self, data: Vec<u8>, mime: &str) -> Result<String, PublishError> {
        if let Ok(text) = std::str::from_utf8(&data)
            && lock(&self.failing).contains(text)
        {
            return Err(PublishError::Storage(ClientError::EmptyResult));
        }
        lock(&self.published).push((data, mime.to_string()));
        Ok(format!(
            "ipfs://fake-{}",
            self.next.fetch_add(1, Ordering::SeqCst)
        ))
    }
}

#[async_trait]
impl AssetPublisher for FakePublisher {
    async fn publish_bytes(&self, data: Vec<u8>, mime: &str) -> Result<String, PublishError> {
        self.store(data, mime)
    }

    async fn publish_json(&self, json: String) -> Result<String, PublishError> {
        self.store(json.into_bytes(), "application/json")
    }
}

#[derive(Debug, Clone, Copy)]
struct FakeAccount {
    pending: u64,
    capacity: u64,
    low_water_mark: u64,
}

/// A buffer account in memory. Successful registrations, and registrations
/// marked as landing despite an unknown outcome, grow `pending`.
pub struct FakeLedger {
    account: Mutex<FakeAccount>,
    signer: Keypair,
    rejected: Mutex<HashSet<String>>,
    unknown_but_lands: Mutex<HashSet<String>>,
    registered: Mutex<Vec<String>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeLedger {
    pub fn new(pending: u64, capacity: u64, low_water_mark: u64) -> Self {
        Self {
            account: Mutex::new(FakeAccount {
                pending,
                capacity,
                low_water_mark,
            }),
            signer: Keypair::from_seed(&[42; 32]).unwrap(),
            rejected: Mutex::new(HashSet::new()),
            unknown_but_lands: Mutex::new(HashSet::new()),
            registered: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting(self, name: &str) -> Self {
        lock(&self.rejected).insert(name.to_string());
        self
    }

    pub fn unknown_but_landing(self, name: &str) -> Self {
        lock(&self.unknown_but_lands).insert(name.to_string());
        self
    }

    pub fn set_pending(&self, pending: u64) {
        lock(&self.account).pending = pending;
    }

    pub fn pending(&self) -> u64 {
        lock(&self.account).pending
    }

    pub fn registered(&self) -> Vec<String> {
        lock(&self.registered).clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn land(&self, name: &str) {
        let mut account = lock(&self.account);
        account.pending = (account.pending + 1).min(account.capacity);
        lock(&self.registered).push(name.to_string());
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn fetch_state(&self) -> Result<BufferState, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let a = *lock(&self.account);
        Ok(BufferState::new(a.pending, a.capacity, a.low_water_mark)?)
    }

    async fn register(
        &self,
        registration: &Registration<'_>,
    ) -> Result<TxSignature, SubmissionError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let name = registration.name;
        let signature = self.signer.sign(name.as_bytes());
        if lock(&self.rejected).contains(name) {
            return Err(
                SubmissionError::new(SubmissionErrorKind::Rejected, "custom program error: 0x1")
                    .with_signature(signature),
            );
        }
        if lock(&self.unknown_but_lands).contains(name) {
            self.land(name);
            return Err(
                SubmissionError::new(SubmissionErrorKind::Unknown, "confirmation timed out")
                    .with_signature(signature),
            );
        }
        self.land(name);
        Ok(signature)
    }
}

/// A feed returning the same headlines on every call.
pub struct FakeFeed {
    headlines: Vec<String>,
}

impl FakeFeed {
    pub fn new(headlines: &[&str]) -> Self {
        Self {
            headlines: headlines.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[async_trait]
impl HeadlineFeed for FakeFeed {
    async fn headlines(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.headlines.clone())
    }
}

/// Echoes the prompt as the asset, without a content type.
#[derive(Default)]
pub struct FakeTransformer {
    failing: HashSet<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeTransformer {
    pub fn failing_on(prompts: &[&str]) -> Self {
        Self {
            failing: prompts.iter().map(|p| p.to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl AssetTransformer for FakeTransformer {
    async fn transform(&self, prompt: &str) -> Result<(Bytes, Option<String>), ClientError> {
        lock(&self.prompts).push(prompt.to_string());
        if self.failing.contains(prompt) {
            return Err(ClientError::EmptyResult);
        }
        Ok((Bytes::from(prompt.to_string()), None))
    }
}
