//! Solana JSON-RPC envelopes and result types.
//!
//! Only the handful of methods used by the replenisher are modelled:
//! `getAccountInfo`, `getLatestBlockhash`, `sendTransaction`,
//! `getSignatureStatuses` and the `accountSubscribe` notification stream.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, thiserror::Error)]
#[error("rpc error {code}: {message}")]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// `sendTransaction` preflight simulation failed.
    pub const PREFLIGHT_FAILURE: i64 = -32002;
    /// The blockhash used is no longer valid.
    pub const BLOCKHASH_NOT_FOUND: i64 = -32003;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// Results wrapped with the slot they were observed at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcResponse<T> {
    pub context: RpcContext,
    pub value: T,
}

/// Commitment levels, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Account as returned with `"encoding": "base64"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAccount {
    /// `[payload, encoding]`
    pub data: (String, String),
    pub lamports: u64,
    pub owner: String,
    #[serde(default)]
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountDataError {
    #[error("unsupported account encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("invalid base64 account data")]
    InvalidBase64,
}

impl UiAccount {
    /// Decode the raw account bytes.
    pub fn decode_data(&self) -> Result<Vec<u8>, AccountDataError> {
        let (payload, encoding) = &self.data;
        if encoding != "base64" {
            return Err(AccountDataError::UnsupportedEncoding(encoding.clone()));
        }
        fast32::base64::RFC4648
            .decode_str(payload)
            .map_err(|_| AccountDataError::InvalidBase64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the transaction has reached at least `commitment`.
    pub fn reached(&self, commitment: Commitment) -> bool {
        self.confirmation_status
            .is_some_and(|status| status >= commitment)
    }
}

/// `accountNotification` message pushed on an `accountSubscribe` socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountNotification {
    pub method: String,
    pub params: AccountNotificationParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountNotificationParams {
    pub result: RpcResponse<UiAccount>,
    pub subscription: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_notification() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "result": {
                    "context": { "slot": 5199307 },
                    "value": {
                        "data": ["AQID", "base64"],
                        "executable": false,
                        "lamports": 33594,
                        "owner": "11111111111111111111111111111111",
                        "rentEpoch": 635,
                        "space": 3
                    }
                },
                "subscription": 23784
            }
        }"#;
        let note: AccountNotification = serde_json::from_str(json).unwrap();
        assert_eq!(note.params.subscription, 23784);
        assert_eq!(note.params.result.context.slot, 5199307);
        assert_eq!(note.params.result.value.decode_data().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_non_base64_encoding() {
        let account = UiAccount {
            data: ("abc".into(), "base58".into()),
            lamports: 0,
            owner: String::new(),
            executable: false,
        };
        assert_eq!(
            account.decode_data().unwrap_err(),
            AccountDataError::UnsupportedEncoding("base58".into())
        );
    }

    #[test]
    fn test_signature_status_commitment_ordering() {
        let status: SignatureStatus = serde_json::from_str(
            r#"{"slot": 1, "confirmations": 3, "err": null, "confirmationStatus": "confirmed"}"#,
        )
        .unwrap();
        assert!(status.reached(Commitment::Processed));
        assert!(status.reached(Commitment::Confirmed));
        assert!(!status.reached(Commitment::Finalized));
        assert!(status.err.is_none());
    }

    #[test]
    fn test_error_envelope() {
        let resp: JsonRpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Transaction simulation failed"}}"#,
        )
        .unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, JsonRpcError::PREFLIGHT_FAILURE);
    }
}
