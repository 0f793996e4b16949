//! HTTP client for an IPFS-style pinning API
//!
//! Speaks the Kubo RPC surface: `POST /api/v0/add` (multipart upload,
//! returns the CID), `POST /api/v0/cat?arg=<cid>` (fetch bytes), and
//! `POST /api/v0/version` as the startup connectivity probe. Every network
//! failure maps to the transient `StorageUnavailable` class; a 404/500
//! "not found" response from `cat` maps to `NotFound`.

use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::StorageAdapter;
use crate::types::{EngineError, Result};

/// Configuration for [`HttpStorage`]
#[derive(Debug, Clone)]
pub struct HttpStorageConfig {
    /// API endpoint, e.g. "http://127.0.0.1:5001"
    pub api_url: String,
    /// Public gateway base for [`StorageAdapter::gateway_url`],
    /// e.g. "https://ipfs.io"
    pub gateway_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpStorageConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            gateway_url: "https://ipfs.io".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Response from `/api/v0/add`
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    _size: Option<String>,
}

/// Live storage adapter over the IPFS HTTP API
pub struct HttpStorage {
    config: HttpStorageConfig,
    client: reqwest::Client,
}

impl HttpStorage {
    pub fn new(config: HttpStorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("http client build failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl StorageAdapter for HttpStorage {
    async fn put(&self, data: Bytes, content_type_hint: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name("payload")
            .mime_str(content_type_hint)
            .map_err(|e| EngineError::Validation(format!("bad content type hint: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.api("/api/v0/add?cid-version=1"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::StorageUnavailable(format!("add request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::StorageUnavailable(format!(
                "add returned HTTP {}",
                response.status()
            )));
        }

        let parsed: AddResponse = response
            .json()
            .await
            .map_err(|e| EngineError::StorageUnavailable(format!("add response malformed: {}", e)))?;

        debug!(cid = %parsed.hash, "Pinned to storage backend");
        Ok(parsed.hash)
    }

    async fn get(&self, cid: &str) -> Result<Bytes> {
        let response = self
            .client
            .post(self.api("/api/v0/cat"))
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(|e| EngineError::StorageUnavailable(format!("cat request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(format!("no object for cid {}", cid)));
        }
        if !status.is_success() {
            // Kubo reports unknown blocks as a 500 with an error body
            let body = response.text().await.unwrap_or_default();
            if body.contains("not found") || body.contains("no link") {
                return Err(EngineError::NotFound(format!("no object for cid {}", cid)));
            }
            return Err(EngineError::StorageUnavailable(format!(
                "cat returned HTTP {}: {}",
                status, body
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| EngineError::StorageUnavailable(format!("cat body read failed: {}", e)))
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!(
            "{}/ipfs/{}",
            self.config.gateway_url.trim_end_matches('/'),
            cid
        )
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .post(self.api("/api/v0/version"))
            .send()
            .await
            .map_err(|e| {
                warn!(api_url = %self.config.api_url, error = %e, "Storage probe failed");
                EngineError::StorageUnavailable(format!("probe failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(EngineError::StorageUnavailable(format!(
                "probe returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url_strips_trailing_slash() {
        let storage = HttpStorage::new(HttpStorageConfig {
            gateway_url: "https://ipfs.io/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(storage.gateway_url("bafyabc"), "https://ipfs.io/ipfs/bafyabc");
    }

    #[test]
    fn test_api_path_joining() {
        let storage = HttpStorage::new(HttpStorageConfig {
            api_url: "http://localhost:5001/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            storage.api("/api/v0/version"),
            "http://localhost:5001/api/v0/version"
        );
    }
}
