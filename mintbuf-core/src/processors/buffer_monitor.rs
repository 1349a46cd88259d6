//! BufferMonitor processor.
//!
//! The BufferMonitor is responsible for:
//! - Receiving `AccountChanged` events
//! - Decoding the payload into a `BufferState` (malformed payloads are
//!   logged and dropped)
//! - Publishing the latest `Observation`
//! - Emitting a `ReplenishmentRequest` when the buffer is at or below its
//!   low-water mark
//!
//! It never calls the orchestrator directly; requests go through a bounded
//! queue since notifications can arrive faster than a run completes.

use crate::entities::{BufferState, DecodeError};
use crate::events::{
    AccountChanged, AccountChangedReceiver, Observation, ObservationSender,
    ReplenishmentRequest, ReplenishmentRequestSender,
};
use kanau::processor::Processor;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("replenishment request channel closed")]
    ChannelClosed,
}

/// The low-water-mark predicate as a request factory.
pub fn evaluate(state: &BufferState) -> Option<ReplenishmentRequest> {
    state.deficit().and_then(ReplenishmentRequest::new)
}

/// Decode raw account bytes and evaluate them.
pub fn on_account_change(
    raw: &[u8],
) -> Result<(BufferState, Option<ReplenishmentRequest>), DecodeError> {
    let state = BufferState::decode(raw)?;
    Ok((state, evaluate(&state)))
}

pub struct BufferMonitor {
    request_tx: ReplenishmentRequestSender,
    observation_tx: ObservationSender,
}

impl BufferMonitor {
    /// Create a new BufferMonitor.
    ///
    /// # Arguments
    ///
    /// * `request_tx` - Sender for ReplenishmentRequest events
    /// * `observation_tx` - Publisher of the latest buffer Observation
    pub fn new(request_tx: ReplenishmentRequestSender, observation_tx: ObservationSender) -> Self {
        Self {
            request_tx,
            observation_tx,
        }
    }

    /// Run until shutdown is signaled or the event channel closes.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut event_rx: AccountChangedReceiver,
    ) {
        info!("BufferMonitor started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("BufferMonitor received shutdown signal");
                        break;
                    }
                }

                Some(event) = event_rx.recv() => {
                    match self.process(event).await {
                        Ok(_) => {}
                        Err(MonitorError::Decode(e)) => {
                            warn!(error = %e, "dropping undecodable account notification");
                        }
                        Err(MonitorError::ChannelClosed) => {
                            info!("ReplenishmentRequest channel closed");
                            break;
                        }
                    }
                }

                else => {
                    info!("AccountChanged channel closed");
                    break;
                }
            }
        }

        info!("BufferMonitor shutdown complete");
    }

    /// Whether `slot` is older than the latest observation.
    fn is_stale(&self, slot: Option<u64>) -> bool {
        let latest = self.observation_tx.borrow().and_then(|o| o.slot);
        matches!((slot, latest), (Some(slot), Some(latest)) if slot < latest)
    }
}

impl Processor<AccountChanged> for BufferMonitor {
    type Output = Option<ReplenishmentRequest>;
    type Error = MonitorError;

    async fn process(
        &self,
        event: AccountChanged,
    ) -> Result<Option<ReplenishmentRequest>, MonitorError> {
        if self.is_stale(event.slot) {
            debug!(slot = ?event.slot, "ignoring out-of-order account notification");
            return Ok(None);
        }

        let (state, request) = on_account_change(&event.data)?;
        self.observation_tx.send_replace(Some(Observation {
            state,
            slot: event.slot,
            observed_at: event.received_at,
        }));
        debug!(
            pending = state.pending_count(),
            capacity = state.buffer_capacity(),
            low_water_mark = state.low_water_mark(),
            slot = ?event.slot,
            "buffer state observed"
        );

        let Some(request) = request else {
            return Ok(None);
        };
        info!(
            request_id = %request.request_id,
            deficit = request.deficit,
            "buffer at or below low-water mark, requesting replenishment"
        );
        self.request_tx
            .send(request.clone())
            .await
            .map_err(|_| MonitorError::ChannelClosed)?;
        Ok(Some(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::buffer_state::fixtures::encoded;
    use crate::events::{account_changed_channel, observation_channel, replenishment_request_channel};
    use std::time::Duration;

    fn monitor() -> (
        BufferMonitor,
        crate::events::ReplenishmentRequestReceiver,
        crate::events::ObservationReceiver,
    ) {
        let (request_tx, request_rx) = replenishment_request_channel(8);
        let (observation_tx, observation_rx) = observation_channel();
        (
            BufferMonitor::new(request_tx, observation_tx),
            request_rx,
            observation_rx,
        )
    }

    #[test]
    fn test_on_account_change() {
        let (state, request) = on_account_change(&encoded(2, 10, 3)).unwrap();
        assert_eq!(state.pending_count(), 2);
        assert_eq!(request.unwrap().deficit, 8);
        let (state, request) = on_account_change(&encoded(4, 10, 3)).unwrap();
        assert!(!state.needs_replenishment());
        assert!(request.is_none());
        assert!(on_account_change(b"garbage").is_err());
    }

    #[tokio::test]
    async fn test_process_emits_request_and_observation() {
        let (monitor, mut request_rx, observation_rx) = monitor();
        let emitted = monitor
            .process(AccountChanged::new(encoded(2, 10, 3), Some(100)))
            .await
            .unwrap()
            .unwrap();
        let queued = request_rx.recv().await.unwrap();
        assert_eq!(queued, emitted);
        assert_eq!(queued.deficit, 8);

        let observation = observation_rx.borrow().unwrap();
        assert_eq!(observation.state.pending_count(), 2);
        assert_eq!(observation.slot, Some(100));
    }

    #[tokio::test]
    async fn test_above_mark_emits_nothing() {
        let (monitor, mut request_rx, _obs) = monitor();
        let out = monitor
            .process(AccountChanged::new(encoded(5, 10, 3), None))
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(request_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_notification_ignored() {
        let (monitor, mut request_rx, observation_rx) = monitor();
        monitor
            .process(AccountChanged::new(encoded(6, 10, 3), Some(200)))
            .await
            .unwrap();
        let out = monitor
            .process(AccountChanged::new(encoded(1, 10, 3), Some(150)))
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(request_rx.try_recv().is_err());
        assert_eq!(observation_rx.borrow().unwrap().state.pending_count(), 6);
    }

    #[tokio::test]
    async fn test_run_drops_malformed_and_continues() {
        let (monitor, mut request_rx, _obs) = monitor();
        let (event_tx, event_rx) = account_changed_channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(shutdown_rx, event_rx));

        event_tx
            .send(AccountChanged::new(vec![0u8; 3], None))
            .await
            .unwrap();
        event_tx
            .send(AccountChanged::new(encoded(0, 4, 1), None))
            .await
            .unwrap();

        let request = tokio::time::timeout(Duration::from_secs(1), request_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.deficit, 4);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
