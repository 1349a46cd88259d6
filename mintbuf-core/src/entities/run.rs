//! Orchestration run bookkeeping.

use crate::entities::item::{InvalidItem, RegisteredItem};
use crate::events::ReplenishmentRequest;
use crate::ledger::SubmissionError;
use crate::publisher::PublishError;
use mintbuf_sdk::objects::RunSummary;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Run-level phase. Per-item stages are tracked by [`ItemStage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Sourcing,
    Processing,
    Done,
}

/// The per-item pipeline stage an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Validating,
    Publishing,
    Registering,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemStage::Validating => "validating",
            ItemStage::Publishing => "publishing",
            ItemStage::Registering => "registering",
        })
    }
}

/// Why an item ended up `Failed`.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("invalid item: {0}")]
    Invalid(#[from] InvalidItem),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Terminal outcome of one item within a run.
#[derive(Debug)]
pub enum ItemOutcome {
    Succeeded(RegisteredItem),
    Failed { stage: ItemStage, error: ItemError },
    /// Never started, because the process was shutting down.
    Skipped,
}

impl ItemOutcome {
    pub fn failed(stage: ItemStage, error: impl Into<ItemError>) -> Self {
        ItemOutcome::Failed {
            stage,
            error: error.into(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ItemOutcome::Skipped)
    }

    /// Whether the item may be on the ledger: it succeeded, or its
    /// transaction was sent and the outcome is unknown.
    pub fn may_be_registered(&self) -> bool {
        match self {
            ItemOutcome::Succeeded(_) => true,
            ItemOutcome::Failed {
                error: ItemError::Submission(e),
                ..
            } => e.is_unknown(),
            _ => false,
        }
    }
}

/// The unit of work owning one [`ReplenishmentRequest`].
///
/// Outcomes are slotted by source order; an item that never reports an
/// outcome is `Skipped` when the run is finished.
#[derive(Debug)]
pub struct OrchestrationRun {
    request: ReplenishmentRequest,
    phase: RunPhase,
    outcomes: Vec<Option<ItemOutcome>>,
    source_error: Option<String>,
    started_at: OffsetDateTime,
}

impl OrchestrationRun {
    pub fn new(request: ReplenishmentRequest) -> Self {
        Self {
            request,
            phase: RunPhase::Idle,
            outcomes: Vec::new(),
            source_error: None,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn begin_sourcing(&mut self) {
        self.phase = RunPhase::Sourcing;
    }

    /// Record how many items the source returned and move to processing.
    pub fn sourced(&mut self, count: usize) {
        self.outcomes = (0..count).map(|_| None).collect();
        self.phase = RunPhase::Processing;
    }

    /// The source could not be reached at all; the run has nothing to process.
    pub fn source_failed(&mut self, error: impl fmt::Display) {
        self.source_error = Some(error.to_string());
        self.outcomes.clear();
        self.phase = RunPhase::Processing;
    }

    pub fn record(&mut self, index: usize, outcome: ItemOutcome) {
        if let Some(slot) = self.outcomes.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    pub fn finish(mut self) -> RunReport {
        self.phase = RunPhase::Done;
        RunReport {
            request_id: self.request.request_id,
            deficit: self.request.deficit,
            triggered_at: self.request.triggered_at,
            outcomes: self
                .outcomes
                .into_iter()
                .map(|o| o.unwrap_or(ItemOutcome::Skipped))
                .collect(),
            source_error: self.source_error,
            started_at: self.started_at,
            finished_at: OffsetDateTime::now_utc(),
        }
    }
}

/// The immutable result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub request_id: Uuid,
    pub deficit: u64,
    pub triggered_at: OffsetDateTime,
    /// In source order.
    pub outcomes: Vec<ItemOutcome>,
    /// Set when the source failed as a whole.
    pub source_error: Option<String>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl RunReport {
    pub fn sourced(&self) -> u64 {
        self.outcomes.len() as u64
    }

    pub fn shortfall(&self) -> u64 {
        self.deficit.saturating_sub(self.sourced())
    }

    pub fn succeeded(&self) -> u64 {
        self.outcomes.iter().filter(|o| o.is_succeeded()).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.outcomes.iter().filter(|o| o.is_failed()).count() as u64
    }

    pub fn skipped(&self) -> u64 {
        self.outcomes.iter().filter(|o| o.is_skipped()).count() as u64
    }

    pub fn registered(&self) -> impl Iterator<Item = &RegisteredItem> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Succeeded(item) => Some(item),
            _ => None,
        })
    }

    pub fn to_summary(&self) -> RunSummary {
        RunSummary {
            request_id: self.request_id,
            deficit: self.deficit,
            sourced: self.sourced(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            started_at: self.started_at.unix_timestamp(),
            finished_at: self.finished_at.unix_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::InvalidItem;
    use mintbuf_sdk::transaction::Keypair;

    fn registered() -> RegisteredItem {
        let signer = Keypair::from_seed(&[3; 32]).unwrap();
        RegisteredItem {
            metadata_uri: "ipfs://a".into(),
            name: "A".into(),
            category: "NEWS".into(),
            price_bps: 500,
            signature: signer.sign(b"a"),
        }
    }

    #[test]
    fn test_unreported_items_are_skipped() {
        let request = ReplenishmentRequest::new(8).unwrap();
        let mut run = OrchestrationRun::new(request);
        assert_eq!(run.phase(), RunPhase::Idle);
        run.begin_sourcing();
        run.sourced(3);
        assert_eq!(run.phase(), RunPhase::Processing);
        run.record(0, ItemOutcome::Succeeded(registered()));
        run.record(
            2,
            ItemOutcome::failed(ItemStage::Validating, InvalidItem::EmptyName),
        );

        let report = run.finish();
        assert_eq!(report.deficit, 8);
        assert_eq!(report.sourced(), 3);
        assert_eq!(report.shortfall(), 5);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(report.outcomes[1].is_skipped());

        let summary = report.to_summary();
        assert_eq!(summary.request_id, report.request_id);
        assert_eq!(summary.sourced, 3);
    }

    #[test]
    fn test_source_failure_has_no_items() {
        let mut run = OrchestrationRun::new(ReplenishmentRequest::new(4).unwrap());
        run.begin_sourcing();
        run.source_failed("pool unreachable");
        let report = run.finish();
        assert_eq!(report.sourced(), 0);
        assert_eq!(report.shortfall(), 4);
        assert_eq!(report.source_error.as_deref(), Some("pool unreachable"));
    }
}
