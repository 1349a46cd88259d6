//! [`LedgerClient`] over Solana JSON-RPC.

use super::{LedgerClient, LedgerError, Registration, SubmissionError, SubmissionErrorKind};
use crate::config::LedgerConfig;
use crate::entities::BufferState;
use async_trait::async_trait;
use mintbuf_sdk::client::{ClientError, RpcClient};
use mintbuf_sdk::objects::{Commitment, JsonRpcError};
use mintbuf_sdk::pubkey::Pubkey;
use mintbuf_sdk::transaction::{
    AddToBufferArgs, Keypair, Message, Transaction, TransactionError, TxSignature,
    add_to_buffer_instruction,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Submits `add_to_buffer` signed by the buffer authority and waits for the
/// configured commitment.
pub struct SolanaLedgerClient {
    rpc: RpcClient,
    authority: Keypair,
    program_id: Pubkey,
    state_account: Pubkey,
    commitment: Commitment,
    confirm_timeout: Duration,
}

impl SolanaLedgerClient {
    pub fn new(config: &LedgerConfig, authority: Keypair) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self {
            rpc: RpcClient::new(config.rpc_url.clone()).with_http_client(http),
            authority,
            program_id: config.program_id,
            state_account: config.state_account,
            commitment: config.commitment,
            confirm_timeout: config.confirm_timeout,
        })
    }

    pub fn authority(&self) -> Pubkey {
        self.authority.pubkey()
    }

    fn build_transaction(
        &self,
        registration: &Registration<'_>,
        recent_blockhash: [u8; 32],
    ) -> Result<Transaction, TransactionError> {
        let instruction = add_to_buffer_instruction(
            self.program_id,
            self.state_account,
            self.authority.pubkey(),
            &AddToBufferArgs {
                metadata_uri: registration.metadata_uri,
                name: registration.name,
                symbol: registration.category,
                seller_fee_basis_points: registration.price_bps,
            },
        )?;
        let message = Message::compile(&[instruction], self.authority.pubkey(), recent_blockhash)?;
        Transaction::sign(message, &[&self.authority])
    }

    async fn recent_blockhash(&self) -> Result<[u8; 32], SubmissionError> {
        let latest = self
            .rpc
            .get_latest_blockhash(self.commitment)
            .await
            .map_err(|e| SubmissionError::new(SubmissionErrorKind::Transport, e))?;
        decode_blockhash(&latest.value.blockhash)
    }

    /// Poll `getSignatureStatuses` until the commitment is reached, the
    /// transaction errors, or the timeout elapses.
    async fn confirm(&self, signature: TxSignature) -> Result<(), SubmissionError> {
        let deadline = Instant::now() + self.confirm_timeout;
        let signatures = [signature.to_string()];
        loop {
            match self.rpc.get_signature_statuses(&signatures).await {
                Ok(resp) => {
                    if let Some(Some(status)) = resp.value.into_iter().next() {
                        if let Some(err) = status.err {
                            return Err(SubmissionError::new(
                                SubmissionErrorKind::Rejected,
                                format!("transaction failed on chain: {err}"),
                            )
                            .with_signature(signature));
                        }
                        if status.reached(self.commitment) {
                            debug!(%signature, slot = status.slot, "transaction confirmed");
                            return Ok(());
                        }
                    }
                }
                Err(e) => warn!(%signature, error = %e, "signature status poll failed"),
            }

            if Instant::now() >= deadline {
                return Err(SubmissionError::new(
                    SubmissionErrorKind::Unknown,
                    format!(
                        "not confirmed at {} within {:?}",
                        self.commitment.as_str(),
                        self.confirm_timeout
                    ),
                )
                .with_signature(signature));
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl LedgerClient for SolanaLedgerClient {
    #[instrument(skip(self), fields(account = %self.state_account))]
    async fn fetch_state(&self) -> Result<BufferState, LedgerError> {
        let resp = self
            .rpc
            .get_account_info(&self.state_account, self.commitment)
            .await?;
        let account = resp
            .value
            .ok_or(LedgerError::AccountNotFound(self.state_account))?;
        Ok(BufferState::decode(&account.decode_data()?)?)
    }

    #[instrument(skip(self), fields(name = registration.name))]
    async fn register(
        &self,
        registration: &Registration<'_>,
    ) -> Result<TxSignature, SubmissionError> {
        let blockhash = self.recent_blockhash().await?;
        let tx = self
            .build_transaction(registration, blockhash)
            .map_err(|e| SubmissionError::new(SubmissionErrorKind::Encoding, e))?;
        let signature = tx.id().ok_or_else(|| {
            SubmissionError::new(SubmissionErrorKind::Encoding, "transaction has no signature")
        })?;
        let wire = tx
            .to_base64()
            .map_err(|e| SubmissionError::new(SubmissionErrorKind::Encoding, e))?;

        self.rpc
            .send_transaction(&wire, self.commitment)
            .await
            .map_err(|e| {
                SubmissionError::new(classify_send_error(&e), e).with_signature(signature)
            })?;
        debug!(%signature, "transaction broadcast");

        if !self.confirm_timeout.is_zero() {
            self.confirm(signature).await?;
        }
        Ok(signature)
    }
}

fn decode_blockhash(blockhash: &str) -> Result<[u8; 32], SubmissionError> {
    let bytes = bs58::decode(blockhash)
        .into_vec()
        .map_err(|e| SubmissionError::new(SubmissionErrorKind::Encoding, e))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        SubmissionError::new(
            SubmissionErrorKind::Encoding,
            format!("blockhash is {} bytes", bytes.len()),
        )
    })
}

/// Map a `sendTransaction` failure to a [`SubmissionErrorKind`].
pub fn classify_send_error(error: &ClientError) -> SubmissionErrorKind {
    match error {
        ClientError::Rpc(rpc) => classify_rpc_error(rpc),
        e if e.is_indeterminate() => SubmissionErrorKind::Unknown,
        _ => SubmissionErrorKind::Transport,
    }
}

fn classify_rpc_error(error: &JsonRpcError) -> SubmissionErrorKind {
    let detail = match &error.data {
        Some(data) => format!("{} {}", error.message, data),
        None => error.message.clone(),
    };
    let detail = detail.to_ascii_lowercase();
    if detail.contains("insufficientfunds")
        || detail.contains("insufficient funds")
        || detail.contains("no record of a prior credit")
    {
        return SubmissionErrorKind::InsufficientFunds;
    }
    match error.code {
        JsonRpcError::PREFLIGHT_FAILURE => SubmissionErrorKind::Simulation,
        _ => SubmissionErrorKind::Rejected,
    }
}
