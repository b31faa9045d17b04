use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::editing::transport::{Relay, RelayError};
use crate::utilities::api_utils::DetectServerError;

/// transfer.sh compatible host, files are PUT to `{base}{filename}`
pub struct TransferSh {
    http_client: reqwest::Client,
    base_url: Url,
}

impl TransferSh {
    pub const fn new(http_client: reqwest::Client, base_url: Url) -> Self {
        Self { http_client, base_url }
    }
}

/// the response body is the public URL of the file
fn parse_uploaded_url(body: &str) -> Result<String, RelayError> {
    let body = body.trim();

    match Url::parse(body) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.into()),
        _ => Err(RelayError::InvalidUrl(body.into())),
    }
}

#[async_trait]
impl Relay for TransferSh {
    async fn put(&self, filename: &str, image: Bytes) -> Result<String, RelayError> {
        let url = self
            .base_url
            .join(filename)
            .map_err(|_| RelayError::InvalidUrl(format!("{}{filename}", self.base_url)))?;

        let response = self
            .http_client
            .put(url)
            .header("Max-Days", "1")
            .body(image)
            .send()
            .await?
            .server_error()?;

        if !response.status().is_success() {
            return Err(RelayError::Status(response.status()));
        }

        parse_uploaded_url(&response.text().await?)
    }
}
