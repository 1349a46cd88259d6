//! `accountSubscribe` over the Solana PubSub WebSocket.
//!
//! # Protocol
//!
//! 1. The client sends `accountSubscribe` with base64 encoding.
//! 2. The node answers `{"result": <subscription id>, "id": 1}`.
//! 3. Every write to the account is pushed as an `accountNotification`
//!    carrying the full account data.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::rpc::{AccountNotification, Commitment, JsonRpcRequest, JsonRpcResponse, RpcResponse, UiAccount};
use crate::pubkey::Pubkey;

const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// A live account subscription.
pub struct AccountSubscription {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    subscription_id: u64,
}

impl AccountSubscription {
    /// Connect to `ws_url` and subscribe to writes of `account`.
    pub async fn connect(
        ws_url: &Url,
        account: &Pubkey,
        commitment: Commitment,
    ) -> Result<Self, ClientError> {
        let (mut socket, _) = connect_async(ws_url.as_str()).await?;

        let request = JsonRpcRequest::new(
            SUBSCRIBE_REQUEST_ID,
            "accountSubscribe",
            json!([
                account.to_string(),
                { "encoding": "base64", "commitment": commitment.as_str() }
            ]),
        );
        socket
            .send(Message::text(serde_json::to_string(&request)?))
            .await?;

        // The ack is the first text frame carrying our request id.
        let subscription_id = loop {
            let Some(frame) = socket.next().await else {
                return Err(ClientError::Subscription(
                    "socket closed before subscription ack".into(),
                ));
            };
            let Message::Text(text) = frame? else {
                continue;
            };
            let ack: JsonRpcResponse<u64> = serde_json::from_str(&text)?;
            if ack.id != Some(SUBSCRIBE_REQUEST_ID) {
                continue;
            }
            if let Some(error) = ack.error {
                return Err(ClientError::Rpc(error));
            }
            break ack.result.ok_or(ClientError::EmptyResult)?;
        };

        tracing::debug!(%account, subscription_id, "accountSubscribe acknowledged");
        Ok(Self {
            socket,
            subscription_id,
        })
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    /// Wait for the next account write.
    ///
    /// Returns `None` once the socket is closed.
    pub async fn next_update(&mut self) -> Option<Result<RpcResponse<UiAccount>, ClientError>> {
        loop {
            let frame = match self.socket.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            match frame {
                Message::Text(text) => {
                    let note: AccountNotification = match serde_json::from_str(&text) {
                        Ok(note) => note,
                        Err(e) => return Some(Err(e.into())),
                    };
                    if note.method != "accountNotification"
                        || note.params.subscription != self.subscription_id
                    {
                        continue;
                    }
                    return Some(Ok(note.params.result));
                }
                Message::Close(_) => return None,
                // Pings are answered by tungstenite on the next read.
                _ => continue,
            }
        }
    }
}
