//! Headline feed client.

use reqwest::Client;
use url::Url;

use super::{ClientError, bearer, parse_response};

/// Fetches the current list of headlines from a bearer-authenticated feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    url: Url,
    api_key: String,
}

impl FeedClient {
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

    /// `GET {url}` – a JSON array of headline strings.
    pub async fn headlines(&self) -> Result<Vec<String>, ClientError> {
        let resp = self
            .http
            .get(self.url.clone())
            .header(reqwest::header::AUTHORIZATION, bearer(&self.api_key))
            .send()
            .await?;

        parse_response(resp).await
    }
}
