//! Solana JSON-RPC client over HTTP.

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::rpc::{
    Commitment, JsonRpcRequest, JsonRpcResponse, LatestBlockhash, RpcResponse, SignatureStatus,
    UiAccount,
};
use crate::pubkey::Pubkey;

/// Typed client for the subset of the Solana JSON-RPC API used by the
/// replenisher.
#[derive(Debug)]
pub struct RpcClient {
    http: Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Issue a single JSON-RPC call and unwrap its `result`.
    pub async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<T, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self
            .http
            .post(self.url.clone())
            .json(&JsonRpcRequest::new(id, method, params))
            .send()
            .await?;

        let envelope: JsonRpcResponse<T> = parse_response(resp).await?;
        if let Some(error) = envelope.error {
            return Err(ClientError::Rpc(error));
        }
        envelope.result.ok_or(ClientError::EmptyResult)
    }

    /// `getAccountInfo` with base64 encoding. `value` is `None` when the
    /// account does not exist.
    pub async fn get_account_info(
        &self,
        account: &Pubkey,
        commitment: Commitment,
    ) -> Result<RpcResponse<Option<UiAccount>>, ClientError> {
        self.call(
            "getAccountInfo",
            json!([
                account.to_string(),
                { "encoding": "base64", "commitment": commitment.as_str() }
            ]),
        )
        .await
    }

    /// `getLatestBlockhash`
    pub async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<RpcResponse<LatestBlockhash>, ClientError> {
        self.call(
            "getLatestBlockhash",
            json!([{ "commitment": commitment.as_str() }]),
        )
        .await
    }

    /// `sendTransaction` with a base64 wire transaction. Preflight runs at
    /// `commitment`; returns the base58 signature.
    pub async fn send_transaction(
        &self,
        wire_base64: &str,
        commitment: Commitment,
    ) -> Result<String, ClientError> {
        self.call(
            "sendTransaction",
            json!([
                wire_base64,
                {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": commitment.as_str(),
                    "maxRetries": 5
                }
            ]),
        )
        .await
    }

    /// `getSignatureStatuses` – one entry per signature, `None` if unknown.
    pub async fn get_signature_statuses(
        &self,
        signatures: &[String],
    ) -> Result<RpcResponse<Vec<Option<SignatureStatus>>>, ClientError> {
        self.call(
            "getSignatureStatuses",
            json!([signatures, { "searchTransactionHistory": false }]),
        )
        .await
    }
}
