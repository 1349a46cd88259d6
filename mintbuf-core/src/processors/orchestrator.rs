//! ReplenishmentOrchestrator processor.
//!
//! The orchestrator is responsible for:
//! - Receiving `ReplenishmentRequest` events
//! - Guaranteeing at most one run at a time (single-flight), coalescing
//!   requests that arrive during a run
//! - Driving ItemSource -> AssetPublisher -> LedgerClient for every item of a
//!   run with bounded parallelism and per-item failure isolation
//! - Re-reading live state after a run that had coalesced requests
//! - Broadcasting a `RunReport` per completed run

use super::buffer_monitor::evaluate;
use super::single_flight::SingleFlight;
use crate::config::OrchestratorConfig;
use crate::entities::{
    CandidateItem, ItemOutcome, ItemStage, OrchestrationRun, RegisteredItem, RunReport,
};
use crate::events::{
    ReplenishmentRequest, ReplenishmentRequestReceiver, RunReportReceiver, RunReportSender,
    run_report_channel,
};
use crate::ledger::{LedgerClient, Registration};
use crate::publisher::{AssetPublisher, PublishError, publish_candidate};
use crate::sources::ItemSource;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new run was started for it.
    Started,
    /// A run was already in flight; the request was folded into a live
    /// re-evaluation after that run.
    Coalesced,
    /// The orchestrator is shutting down.
    Refused,
}

/// Drives replenishment runs. Cheap to clone; clones share one
/// single-flight slot.
#[derive(Clone)]
pub struct ReplenishmentOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ItemSource>,
    publisher: Option<Arc<dyn AssetPublisher>>,
    ledger: Arc<dyn LedgerClient>,
    config: OrchestratorConfig,
    flight: SingleFlight,
    stopping: AtomicBool,
    idle_tx: watch::Sender<()>,
    report_tx: RunReportSender,
}

impl ReplenishmentOrchestrator {
    /// Create a new ReplenishmentOrchestrator.
    ///
    /// # Arguments
    ///
    /// * `source` - Where candidate items come from
    /// * `publisher` - Asset storage, required when items arrive without a metadata URI
    /// * `ledger` - Reads the buffer state and registers items
    /// * `config` - Concurrency and shutdown settings
    pub fn new(
        source: Arc<dyn ItemSource>,
        publisher: Option<Arc<dyn AssetPublisher>>,
        ledger: Arc<dyn LedgerClient>,
        config: OrchestratorConfig,
    ) -> Self {
        let (report_tx, _) = run_report_channel();
        let (idle_tx, _) = watch::channel(());
        Self {
            inner: Arc::new(Inner {
                source,
                publisher,
                ledger,
                config,
                flight: SingleFlight::new(),
                stopping: AtomicBool::new(false),
                idle_tx,
                report_tx,
            }),
        }
    }

    /// Receive completed run reports.
    pub fn subscribe_reports(&self) -> RunReportReceiver {
        self.inner.report_tx.subscribe()
    }

    /// Whether a run currently holds the single-flight slot.
    pub fn is_in_flight(&self) -> bool {
        self.inner.flight.is_running()
    }

    /// Hand a request to the orchestrator. Never blocks on the run itself.
    pub fn submit(&self, request: ReplenishmentRequest) -> SubmitOutcome {
        if self.inner.stopping.load(Ordering::Acquire) {
            return SubmitOutcome::Refused;
        }
        if self.inner.flight.try_acquire() {
            self.spawn_driver(Some(request));
            return SubmitOutcome::Started;
        }

        debug!(
            request_id = %request.request_id,
            deficit = request.deficit,
            "run in flight, coalescing request"
        );
        self.inner.flight.coalesce(request.deficit);
        // The holder may have released between our failed acquire and the
        // coalesce; pick up the marker ourselves in that case.
        if self.inner.flight.try_acquire() {
            self.spawn_driver(None);
        }
        SubmitOutcome::Coalesced
    }

    /// Stop starting runs and item pipelines. Items already registering are
    /// left to finish.
    pub fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::Release);
    }

    /// Wait until no run is in flight. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut idle_rx = self.inner.idle_tx.subscribe();
        let idle = async {
            while self.inner.flight.is_running() {
                if idle_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }

    /// Run until shutdown is signaled or the request channel closes, then
    /// give the in-flight run up to the configured grace period.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut request_rx: ReplenishmentRequestReceiver,
    ) {
        info!(
            source = self.inner.source.name(),
            max_in_flight = self.inner.config.max_in_flight,
            "ReplenishmentOrchestrator started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ReplenishmentOrchestrator received shutdown signal");
                        break;
                    }
                }

                Some(request) = request_rx.recv() => {
                    let outcome = self.submit(request);
                    debug!(?outcome, "replenishment request submitted");
                }

                else => {
                    info!("ReplenishmentRequest channel closed");
                    break;
                }
            }
        }

        self.shutdown();
        let grace = self.inner.config.shutdown_grace;
        if !self.wait_idle(grace).await {
            warn!(?grace, "in-flight run did not finish within the grace period");
        }
        info!("ReplenishmentOrchestrator shutdown complete");
    }

    fn spawn_driver(&self, request: Option<ReplenishmentRequest>) {
        let inner = self.inner.clone();
        tokio::spawn(inner.drive(request));
    }
}

impl Inner {
    /// Holds the single-flight slot for as long as there is work.
    async fn drive(self: Arc<Self>, mut request: Option<ReplenishmentRequest>) {
        loop {
            if let Some(req) = request.take() {
                self.execute(req).await;
            }

            if self.stopping.load(Ordering::Acquire) {
                self.flight.release();
                break;
            }
            if let Some(coalesced) = self.flight.take_coalesced() {
                request = self.reevaluate(coalesced).await;
                continue;
            }

            self.flight.release();
            // A request may have coalesced after `take_coalesced` but before
            // `release`.
            if self.flight.has_coalesced() && self.flight.try_acquire() {
                continue;
            }
            break;
        }
        self.idle_tx.send_replace(());
    }

    /// Decide from live state whether coalesced requests still need a run.
    async fn reevaluate(&self, coalesced_deficit: u64) -> Option<ReplenishmentRequest> {
        match self.ledger.fetch_state().await {
            Ok(state) => {
                let request = evaluate(&state);
                info!(
                    coalesced_deficit,
                    pending = state.pending_count(),
                    live_deficit = ?request.as_ref().map(|r| r.deficit),
                    "re-evaluated coalesced requests against live state"
                );
                request
            }
            Err(e) => {
                warn!(
                    error = %e,
                    coalesced_deficit,
                    "failed to read live state, waiting for the next notification"
                );
                None
            }
        }
    }

    async fn execute(self: &Arc<Self>, request: ReplenishmentRequest) -> Arc<RunReport> {
        let request_id = request.request_id;
        let deficit = request.deficit;
        info!(%request_id, deficit, "replenishment run started");

        let mut run = OrchestrationRun::new(request);
        run.begin_sourcing();
        match self.source.fetch(deficit).await {
            Ok(mut items) => {
                if items.len() as u64 > deficit {
                    for extra in items.drain(deficit as usize..) {
                        self.source.release(&extra);
                    }
                }
                if (items.len() as u64) < deficit {
                    info!(
                        %request_id,
                        deficit,
                        sourced = items.len(),
                        shortfall = deficit - items.len() as u64,
                        "source returned fewer items than requested"
                    );
                }
                run.sourced(items.len());

                let max_in_flight = self.config.max_in_flight.max(1);
                let outcomes: Vec<(usize, ItemOutcome)> = stream::iter(items.into_iter().enumerate())
                    .map(|(index, item)| {
                        let this = self.clone();
                        async move { (index, this.process_item(item).await) }
                    })
                    .buffer_unordered(max_in_flight)
                    .collect()
                    .await;
                for (index, outcome) in outcomes {
                    run.record(index, outcome);
                }
            }
            Err(e) => {
                error!(%request_id, source = self.source.name(), error = %e, "item source failed");
                run.source_failed(&e);
            }
        }

        let report = Arc::new(run.finish());
        info!(
            %request_id,
            deficit,
            sourced = report.sourced(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "replenishment run finished"
        );
        // Nobody listening is fine.
        let _ = self.report_tx.send(report.clone());
        report
    }

    /// Run one item and hand it back to the source unless it may already be
    /// on the ledger.
    async fn process_item(&self, mut item: CandidateItem) -> ItemOutcome {
        let outcome = self.item_pipeline(&mut item).await;
        if !outcome.may_be_registered() {
            self.source.release(&item);
        }
        outcome
    }

    /// The per-item pipeline. Every error ends here as an outcome.
    async fn item_pipeline(&self, item: &mut CandidateItem) -> ItemOutcome {
        if self.stopping.load(Ordering::Acquire) {
            return ItemOutcome::Skipped;
        }
        if let Err(e) = item.validate() {
            warn!(name = %item.name, error = %e, "invalid item");
            return ItemOutcome::failed(ItemStage::Validating, e);
        }

        if item.needs_publication() {
            let Some(publisher) = &self.publisher else {
                return ItemOutcome::failed(ItemStage::Publishing, PublishError::NoPublisher);
            };
            if let Err(e) = publish_candidate(publisher.as_ref(), item).await {
                warn!(name = %item.name, error = %e, "publishing failed");
                return ItemOutcome::failed(ItemStage::Publishing, e);
            }
            if let Err(e) = item.validate() {
                warn!(name = %item.name, error = %e, "published item is invalid");
                return ItemOutcome::failed(ItemStage::Validating, e);
            }
        }
        let Some(metadata_uri) = item.metadata_uri.clone() else {
            return ItemOutcome::failed(ItemStage::Publishing, PublishError::MissingAsset);
        };

        // Unregistered items are abandoned on shutdown.
        if self.stopping.load(Ordering::Acquire) {
            return ItemOutcome::Skipped;
        }

        let registration = Registration {
            metadata_uri: &metadata_uri,
            name: &item.name,
            category: &item.category,
            price_bps: item.price_bps,
        };
        let signature = match self.ledger.register(&registration).await {
            Ok(signature) => signature,
            Err(e) => {
                if e.is_unknown() {
                    warn!(
                        name = %item.name,
                        signature = ?e.signature,
                        error = %e,
                        "registration outcome unknown, next observation will tell"
                    );
                } else {
                    error!(name = %item.name, error = %e, "registration failed");
                }
                return ItemOutcome::failed(ItemStage::Registering, e);
            }
        };
        info!(name = %item.name, %signature, "item registered");

        let registered = RegisteredItem {
            metadata_uri,
            name: item.name.clone(),
            category: item.category.clone(),
            price_bps: item.price_bps,
            signature,
        };
        if item.requires_acknowledgement()
            && let Err(e) = self.source.acknowledge(item, &registered).await
        {
            warn!(name = %item.name, error = %e, "acknowledgement failed");
        }
        ItemOutcome::Succeeded(registered)
    }
}
