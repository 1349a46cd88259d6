//! IPFS HTTP API client (content-addressed storage).

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::ipfs::IpfsAddResponse;

#[derive(Debug, Clone)]
pub struct IpfsClient {
    http: Client,
    api_url: Url,
}

impl IpfsClient {
    /// * `api_url` – the node's API root, e.g. `http://localhost:5001`.
    pub fn new(api_url: Url) -> Self {
        Self {
            http: Client::new(),
            api_url,
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v0/add?pin=true&cid-version=1` – store and pin `data`.
    pub async fn add(
        &self,
        data: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<IpfsAddResponse, ClientError> {
        let url = self.api_url.join("/api/v0/add")?;
        let part = Part::bytes(data)
            .file_name(file_name.to_owned())
            .mime_str(mime)?;
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(url)
            .query(&[("pin", "true"), ("cid-version", "1")])
            .multipart(form)
            .send()
            .await?;

        parse_response(resp).await
    }
}
