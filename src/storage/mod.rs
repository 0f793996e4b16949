//! Content-addressed storage adapters
//!
//! One trait, two implementations: an HTTP client for an IPFS-style pinning
//! API ([`HttpStorage`]) and an in-process demo store ([`InMemoryStore`])
//! with the identical contract. Re-uploading identical bytes always yields
//! the same CID on both.

pub mod http;
pub mod memory;

pub use http::{HttpStorage, HttpStorageConfig};
pub use memory::InMemoryStore;

use bytes::Bytes;

use crate::types::Result;

/// Adapter over a content-addressed store
///
/// Implementations make network calls (or touch in-process maps) but never
/// write local disk; retries are applied by the orchestrator's
/// RetryExecutor, not inside the adapter.
#[async_trait::async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Upload bytes and return their content identifier
    ///
    /// Idempotent in effect: identical bytes yield the identical CID.
    /// Fails `StorageUnavailable` on transient backend failure.
    async fn put(&self, data: Bytes, content_type_hint: &str) -> Result<String>;

    /// Retrieve bytes by CID
    ///
    /// Fails `NotFound` when the store has no such object,
    /// `StorageUnavailable` on transient failure.
    async fn get(&self, cid: &str) -> Result<Bytes>;

    /// Public gateway URL for a CID; pure string transform, no network call
    fn gateway_url(&self, cid: &str) -> String;

    /// One-shot connectivity check used by the mode controller at startup
    async fn probe(&self) -> Result<()>;
}
