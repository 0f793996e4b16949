//! In-memory demo store
//!
//! Process-lifetime surrogate for the content-addressed store. Identifiers
//! are genuine CIDv1 strings (raw codec, sha2-256 multihash) so demo and
//! live mode hand out identically-shaped CIDs. Contents are not durable
//! across restarts.

use bytes::Bytes;
use cid::Cid;
use dashmap::DashMap;
use multihash_codetable::{Code, MultihashDigest};
use tracing::debug;

use super::StorageAdapter;
use crate::types::{EngineError, Result};

/// Raw-binary multicodec for CIDv1
const RAW_CODEC: u64 = 0x55;

/// In-memory content-addressed store with real CIDv1 identifiers
pub struct InMemoryStore {
    blobs: DashMap<String, Bytes>,
    gateway_base: String,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            gateway_base: "https://demo.gateway.invalid".to_string(),
        }
    }

    /// Override the gateway base used by [`StorageAdapter::gateway_url`]
    pub fn with_gateway_base(mut self, base: impl Into<String>) -> Self {
        self.gateway_base = base.into();
        self
    }

    /// Compute the CIDv1 for a byte payload
    pub fn cid_for(data: &[u8]) -> String {
        let hash = Code::Sha2_256.digest(data);
        Cid::new_v1(RAW_CODEC, hash).to_string()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Overwrite stored bytes without changing the key
    ///
    /// Test hook for simulating out-of-band tampering with pinned content;
    /// a real content-addressed store cannot do this.
    pub fn corrupt(&self, cid: &str, data: Bytes) {
        self.blobs.insert(cid.to_string(), data);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageAdapter for InMemoryStore {
    async fn put(&self, data: Bytes, content_type_hint: &str) -> Result<String> {
        let cid = Self::cid_for(&data);
        debug!(cid = %cid, size = data.len(), hint = content_type_hint, "Pinned to demo store");
        self.blobs.insert(cid.clone(), data);
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Bytes> {
        self.blobs
            .get(cid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::NotFound(format!("no object for cid {}", cid)))
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_base, cid)
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = InMemoryStore::new();
        let data = Bytes::from_static(b"Il etait une fois...");

        let first = store.put(data.clone(), "text/plain").await.unwrap();
        let second = store.put(data, "text/plain").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryStore::new();
        let data = Bytes::from_static(b"conte payload");

        let cid = store.put(data.clone(), "application/json").await.unwrap();
        let fetched = store.get(&cid).await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get("bafkreinosuchobject").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_cids_parse_and_carry_sha256() {
        let data = b"cultural heritage";
        let cid_str = InMemoryStore::cid_for(data);

        let cid: Cid = cid_str.parse().unwrap();
        assert_eq!(cid.codec(), RAW_CODEC);

        let expected = Code::Sha2_256.digest(data);
        assert_eq!(cid.hash().digest(), expected.digest());
    }

    #[test]
    fn test_gateway_url_is_pure() {
        let store = InMemoryStore::new().with_gateway_base("https://ipfs.example.org");
        assert_eq!(
            store.gateway_url("bafy123"),
            "https://ipfs.example.org/ipfs/bafy123"
        );
    }
}
