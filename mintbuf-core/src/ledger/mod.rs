//! Typed facade over the buffer program: read the state account, submit
//! `add_to_buffer`.

mod solana;

pub use solana::{SolanaLedgerClient, classify_send_error};

use crate::entities::{BufferState, DecodeError};
use async_trait::async_trait;
use mintbuf_sdk::client::ClientError;
use mintbuf_sdk::objects::rpc::AccountDataError;
use mintbuf_sdk::pubkey::Pubkey;
use mintbuf_sdk::transaction::TxSignature;
use std::fmt;
use thiserror::Error;

/// What kind of submission failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionErrorKind {
    /// Preflight simulation failed; nothing was broadcast.
    Simulation,
    /// The authority cannot pay the fee.
    InsufficientFunds,
    /// The transaction executed and failed, or the node refused it.
    Rejected,
    /// The transaction may or may not land. Resolved by the next buffer
    /// observation.
    Unknown,
    /// The request never reached the node.
    Transport,
    /// The transaction could not be built or signed.
    Encoding,
}

impl fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmissionErrorKind::Simulation => "simulation",
            SubmissionErrorKind::InsufficientFunds => "insufficient funds",
            SubmissionErrorKind::Rejected => "rejected",
            SubmissionErrorKind::Unknown => "unknown outcome",
            SubmissionErrorKind::Transport => "transport",
            SubmissionErrorKind::Encoding => "encoding",
        })
    }
}

/// A failed `register` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission failed ({kind}): {message}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
    /// The transaction id, when the transaction was signed before failing.
    pub signature: Option<TxSignature>,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: TxSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == SubmissionErrorKind::Unknown
    }
}

/// Errors reading the state account.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("rpc error: {0}")]
    Client(#[from] ClientError),

    #[error("state account {0} does not exist")]
    AccountNotFound(Pubkey),

    #[error("account data: {0}")]
    AccountData(#[from] AccountDataError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Arguments of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration<'a> {
    pub metadata_uri: &'a str,
    pub name: &'a str,
    pub category: &'a str,
    pub price_bps: u16,
}

/// The program operations the orchestrator depends on.
///
/// `register` is the commit point of an item: before it returns `Ok` the
/// item is not in the buffer, after it is.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read and decode the current state account.
    async fn fetch_state(&self) -> Result<BufferState, LedgerError>;

    /// Submit `add_to_buffer`.
    async fn register(&self, registration: &Registration<'_>)
    -> Result<TxSignature, SubmissionError>;
}
