use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use curio_content::{Cid, ContentStore, ContentStoreError};

use crate::config::PinataConfig;

/// Pinning-service client speaking the Pinata HTTP API.
///
/// Implements the [`ContentStore`] contract: file and JSON adds go through
/// the `pinFileToIPFS` / `pinJSONToIPFS` endpoints (which pin on write),
/// explicit pins through `pinByHash`, and unpins through `unpin`. Unpinning
/// a hash Pinata no longer knows about maps to success, keeping pointer
/// retirement idempotent.
pub struct PinataClient {
    config: PinataConfig,
    client: Client,
}

/// Response body of the pin-add endpoints.
#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

impl PinataClient {
    /// Create a new client with a default `reqwest::Client` using the
    /// configured timeout.
    pub fn new(config: PinataConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Create a client with a custom HTTP client.
    ///
    /// Useful for testing or for sharing a connection pool.
    pub fn with_client(config: PinataConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn check_status(response: Response) -> Result<Response, ContentStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(ContentStoreError::Status {
            code: status.as_u16(),
            detail,
        })
    }

    async fn read_cid(response: Response) -> Result<Cid, ContentStoreError> {
        let body: PinResponse = response
            .json()
            .await
            .map_err(|err| ContentStoreError::Serialization(err.to_string()))?;
        Ok(Cid::new(body.ipfs_hash))
    }
}

#[async_trait]
impl ContentStore for PinataClient {
    async fn add_file(&self, filename: &str, data: Bytes) -> Result<Cid, ContentStoreError> {
        let part = Part::stream(data).file_name(filename.to_owned());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("pinning/pinFileToIPFS"))
            .bearer_auth(&self.config.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ContentStoreError::Connection(err.to_string()))?;
        let response = Self::check_status(response).await?;
        let cid = Self::read_cid(response).await?;

        debug!(%cid, file = filename, "file pinned");
        Ok(cid)
    }

    async fn add_metadata(
        &self,
        metadata: &serde_json::Value,
        label: &str,
    ) -> Result<Cid, ContentStoreError> {
        let body = json!({
            "pinataContent": metadata,
            "pinataMetadata": { "name": label },
        });

        let response = self
            .client
            .post(self.url("pinning/pinJSONToIPFS"))
            .bearer_auth(&self.config.jwt)
            .json(&body)
            .send()
            .await
            .map_err(|err| ContentStoreError::Connection(err.to_string()))?;
        let response = Self::check_status(response).await?;
        let cid = Self::read_cid(response).await?;

        debug!(%cid, label, "metadata pinned");
        Ok(cid)
    }

    async fn add_pin(&self, cid: &Cid, label: &str) -> Result<(), ContentStoreError> {
        let body = json!({
            "hashToPin": cid.as_str(),
            "pinataMetadata": { "name": label },
        });

        let response = self
            .client
            .post(self.url("pinning/pinByHash"))
            .bearer_auth(&self.config.jwt)
            .json(&body)
            .send()
            .await
            .map_err(|err| ContentStoreError::Connection(err.to_string()))?;
        Self::check_status(response).await?;

        debug!(%cid, label, "pin added");
        Ok(())
    }

    async fn remove_pin(&self, cid: &Cid) -> Result<(), ContentStoreError> {
        let response = self
            .client
            .delete(self.url(&format!("pinning/unpin/{cid}")))
            .bearer_auth(&self.config.jwt)
            .send()
            .await
            .map_err(|err| ContentStoreError::Connection(err.to_string()))?;

        // A hash the service no longer tracks is already unpinned.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%cid, "pin was already absent");
            return Ok(());
        }
        Self::check_status(response).await?;

        debug!(%cid, "pin removed");
        Ok(())
    }
}
