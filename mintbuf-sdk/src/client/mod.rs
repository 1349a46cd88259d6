//! HTTP and WebSocket clients for every collaborator of the replenisher.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types and the transaction codec do not pull in `reqwest`.

mod feed;
mod ipfs;
mod pool;
mod rpc;
mod subscription;
mod transform;

pub use feed::FeedClient;
pub use ipfs::IpfsClient;
pub use pool::PoolClient;
pub use rpc::RpcClient;
pub use subscription::AccountSubscription;
pub use transform::TransformClient;

use reqwest::StatusCode;

use crate::objects::JsonRpcError;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The JSON-RPC node answered with an error object.
    #[error(transparent)]
    Rpc(#[from] JsonRpcError),

    /// The JSON-RPC node answered with neither `result` nor `error`.
    #[error("rpc response carried no result")]
    EmptyResult,

    /// WebSocket transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The subscription handshake or a notification was malformed.
    #[error("subscription protocol error: {0}")]
    Subscription(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

impl ClientError {
    /// Whether the request may have reached the server before failing.
    ///
    /// Connection and URL errors happen before anything is sent; a timeout
    /// or a broken body means the outcome is unknown.
    pub fn is_indeterminate(&self) -> bool {
        match self {
            ClientError::Http(e) => !e.is_connect() && !e.is_builder(),
            ClientError::EmptyResult | ClientError::Json(_) => true,
            _ => false,
        }
    }
}

fn bearer(api_key: &str) -> String {
    format!("Bearer {api_key}")
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    Ok(resp)
}
