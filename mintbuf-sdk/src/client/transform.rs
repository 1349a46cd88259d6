//! Image transform client: turns a text prompt into a binary asset.

use bytes::Bytes;
use reqwest::Client;
use url::Url;

use super::{ClientError, bearer, expect_success};
use crate::objects::generator::TransformRequest;

#[derive(Debug, Clone)]
pub struct TransformClient {
    http: Client,
    url: Url,
    api_key: String,
}

impl TransformClient {
    pub fn new(url: Url, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url,
            api_key: api_key.into(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST {url}` with `{"prompt": ...}`; the response body is the asset.
    ///
    /// Returns the bytes and the response content type, if any.
    pub async fn transform(&self, prompt: &str) -> Result<(Bytes, Option<String>), ClientError> {
        let resp = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::AUTHORIZATION, bearer(&self.api_key))
            .json(&TransformRequest {
                prompt: prompt.to_owned(),
            })
            .send()
            .await?;

        let resp = expect_success(resp).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok((resp.bytes().await?, content_type))
    }
}
