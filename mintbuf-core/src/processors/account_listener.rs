//! AccountListener processor.
//!
//! The AccountListener is responsible for:
//! - Reading the monitored account over JSON-RPC whenever a subscription is
//!   (re)established, so writes missed while disconnected are not lost
//! - Holding an `accountSubscribe` WebSocket subscription
//! - Pushing every payload onto the bounded `AccountChanged` queue, waiting
//!   for capacity when the monitor falls behind
//! - Reconnecting with capped exponential backoff plus jitter

use crate::events::{AccountChanged, AccountChangedSender};
use crate::utils::backoff::reconnect_delay_with_jitter;
use mintbuf_sdk::client::{AccountSubscription, RpcClient};
use mintbuf_sdk::objects::Commitment;
use mintbuf_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Why a subscription session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    ChannelClosed,
    Disconnected(String),
}

pub struct AccountListener {
    rpc: Arc<RpcClient>,
    ws_url: Url,
    account: Pubkey,
    commitment: Commitment,
    event_tx: AccountChangedSender,
}

impl AccountListener {
    /// Create a new AccountListener.
    ///
    /// # Arguments
    ///
    /// * `rpc` - RPC client for the initial account read
    /// * `ws_url` - PubSub endpoint to subscribe on
    /// * `account` - The buffer's state account
    /// * `commitment` - Commitment level for reads and notifications
    /// * `event_tx` - Sender for AccountChanged events
    pub fn new(
        rpc: Arc<RpcClient>,
        ws_url: Url,
        account: Pubkey,
        commitment: Commitment,
        event_tx: AccountChangedSender,
    ) -> Self {
        Self {
            rpc,
            ws_url,
            account,
            commitment,
            event_tx,
        }
    }

    /// Run until shutdown is signaled or the monitor goes away.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(account = %self.account, ws_url = %self.ws_url, "AccountListener started");

        let mut attempt: u32 = 0;
        loop {
            match self.session(&mut shutdown_rx, &mut attempt).await {
                SessionEnd::Shutdown => {
                    info!("AccountListener received shutdown signal");
                    break;
                }
                SessionEnd::ChannelClosed => {
                    info!("AccountChanged channel closed");
                    break;
                }
                SessionEnd::Disconnected(reason) => {
                    let delay = reconnect_delay_with_jitter(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(%reason, ?delay, attempt, "account subscription lost, reconnecting");
                    tokio::select! {
                        biased;
                        _ = shutdown_requested(&mut shutdown_rx) => {
                            info!("AccountListener received shutdown signal");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("AccountListener shutdown complete");
    }

    async fn session(&self, shutdown_rx: &mut watch::Receiver<bool>, attempt: &mut u32) -> SessionEnd {
        let connect = AccountSubscription::connect(&self.ws_url, &self.account, self.commitment);
        let mut subscription = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown_rx) => return SessionEnd::Shutdown,
            result = connect => match result {
                Ok(subscription) => subscription,
                Err(e) => return SessionEnd::Disconnected(e.to_string()),
            },
        };
        *attempt = 0;
        info!(
            subscription_id = subscription.subscription_id(),
            "account subscription established"
        );

        if let Some(event) = self.read_current().await
            && let Some(end) = self.forward(shutdown_rx, event).await
        {
            return end;
        }

        loop {
            let update = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown_rx) => return SessionEnd::Shutdown,
                update = subscription.next_update() => update,
            };
            let response = match update {
                None => return SessionEnd::Disconnected("socket closed".into()),
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                Some(Ok(response)) => response,
            };
            let data = match response.value.decode_data() {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, slot = response.context.slot, "undecodable account notification");
                    continue;
                }
            };
            debug!(slot = response.context.slot, len = data.len(), "account notification");
            let event = AccountChanged::new(data, Some(response.context.slot));
            if let Some(end) = self.forward(shutdown_rx, event).await {
                return end;
            }
        }
    }

    /// `getAccountInfo` for the current payload. Failures are logged; the
    /// subscription still delivers the next write.
    async fn read_current(&self) -> Option<AccountChanged> {
        let response = match self.rpc.get_account_info(&self.account, self.commitment).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "initial account read failed");
                return None;
            }
        };
        let Some(account) = response.value else {
            warn!(account = %self.account, "monitored account does not exist");
            return None;
        };
        match account.decode_data() {
            Ok(data) => Some(AccountChanged::new(data, Some(response.context.slot))),
            Err(e) => {
                warn!(error = %e, "initial account data undecodable");
                None
            }
        }
    }

    /// Push an event, waiting for queue capacity. `Some` ends the session.
    async fn forward(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
        event: AccountChanged,
    ) -> Option<SessionEnd> {
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown_rx) => Some(SessionEnd::Shutdown),
            result = self.event_tx.send(event) => result.err().map(|_| SessionEnd::ChannelClosed),
        }
    }
}

/// Resolves once shutdown is signaled or the signal sender is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
