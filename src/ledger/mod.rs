//! Ledger adapters
//!
//! One capability contract over two interchangeable live backends — an
//! append-only consensus topic with a token-mint service
//! ([`ConsensusLedger`]) and a smart-contract registry behind a JSON-RPC
//! gateway ([`RegistryLedger`]) — plus an in-process demo surrogate
//! ([`InMemoryLedger`]) with the identical method contract and failure
//! taxonomy. Backend selection is a deployment-time decision; the
//! orchestrator never branches on which backend it holds.

pub mod consensus;
pub mod memory;
pub mod registry;

pub use consensus::{ConsensusLedger, ConsensusLedgerConfig};
pub use memory::InMemoryLedger;
pub use registry::{RegistryLedger, RegistryLedgerConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContentHash, Result};

// ============================================================================
// Requests and records
// ============================================================================

/// Arguments for anchoring a certification on the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertifyRequest {
    pub content_id: String,
    pub content_hash: ContentHash,
    pub metadata_cid: String,
    pub content_type: String,
    pub license: String,
    pub contributor: String,
}

/// Arguments for appending a reward event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRequest {
    pub contributor: String,
    pub points: u64,
    pub reason: String,
}

/// Backend acknowledgement of an anchored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Backend-specific transaction reference (topic sequence + token
    /// serial, or a transaction hash)
    pub tx_ref: String,
    /// Block number or topic sequence number
    pub block_or_sequence: u64,
}

/// The on-ledger record for a content id, as returned by `lookup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub content_id: String,
    pub content_hash: ContentHash,
    pub metadata_cid: String,
    pub content_type: String,
    pub license: String,
    pub contributor: String,
    pub timestamp: DateTime<Utc>,
    pub tx_ref: String,
    pub block_or_sequence: u64,
}

// ============================================================================
// Adapter contract
// ============================================================================

/// Capability contract shared by every ledger backend
///
/// All backends are append-only by construction: `recertify` creates a new
/// record rather than mutating a prior one, and prior records remain
/// reachable as history on the backend itself.
#[async_trait::async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Anchor a first certification
    ///
    /// Fails `AlreadyCertified` when a record already exists for the
    /// content id; the orchestrator falls back to [`Self::recertify`].
    async fn certify(&self, request: &CertifyRequest) -> Result<LedgerReceipt>;

    /// Append a superseding record for an already-certified content id
    ///
    /// Always succeeds for an existing id; never mutates a prior entry.
    async fn recertify(&self, request: &CertifyRequest) -> Result<LedgerReceipt>;

    /// Read the current record for a content id
    ///
    /// Read-only; absence is `Ok(None)`, never an error.
    async fn lookup(&self, content_id: &str) -> Result<Option<LedgerEntry>>;

    /// Append a reward event
    async fn record_reward(&self, request: &RewardRequest) -> Result<LedgerReceipt>;

    /// One-shot connectivity check used by the mode controller at startup
    async fn probe(&self) -> Result<()>;
}
