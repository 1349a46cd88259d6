//! Ledger (Solana cluster) configuration.

use mintbuf_sdk::objects::Commitment;
use mintbuf_sdk::pubkey::Pubkey;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: Url,
    /// PubSub WebSocket endpoint.
    pub ws_url: Url,
    /// The buffer program.
    pub program_id: Pubkey,
    /// The monitored `State` account.
    pub state_account: Pubkey,
    pub commitment: Commitment,
    /// How long to poll for confirmation after broadcast. Zero disables
    /// polling.
    pub confirm_timeout: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}
