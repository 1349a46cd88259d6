//! Approval pool client (replenisher → private image service).
//!
//! Both endpoints are bearer-authenticated.

use reqwest::Client;
use url::Url;

use super::{ClientError, bearer, expect_success, parse_response};
use crate::objects::pool::{ApprovedNft, NftId, NftStatus, NftStatusUpdate};

/// Typed HTTP client for the approval pool service.
#[derive(Debug, Clone)]
pub struct PoolClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl PoolClient {
    /// * `base_url` – root URL of the service (e.g. `https://images.example.com`).
    /// * `api_key` – bearer token.
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /api/events/current/nfts/random/{count}` – reserve up to `count`
    /// approved items.
    pub async fn random_batch(&self, count: u64) -> Result<Vec<ApprovedNft>, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/events/current/nfts/random/{count}"))?;

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, bearer(&self.api_key))
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /api/nfts/{id}/status` – report an item's new lifecycle status.
    pub async fn update_status(&self, id: &NftId, status: NftStatus) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!(
            "/api/nfts/{}/status",
            urlencoding::encode(&id.0)
        ))?;

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, bearer(&self.api_key))
            .json(&NftStatusUpdate { status })
            .send()
            .await?;

        expect_success(resp).await.map(|_| ())
    }
}
