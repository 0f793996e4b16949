//! Registry-contract ledger backend (backend B)
//!
//! Anchors certifications as transactions against a stateful registry
//! contract keyed by content id, reached through a JSON-RPC 2.0 contract
//! gateway (the gateway holds the contract binding and signs transactions
//! with the configured signer key):
//!
//! - `registry_certify` / `registry_recertify` / `registry_recordReward`
//!   — state-changing calls, return `{transaction_hash, block_number}`
//! - `registry_lookup` — free read call, returns the record or `null`
//! - `registry_version` — connectivity probe
//!
//! `tx_ref` is the transaction hash, `block_or_sequence` the block number.
//! The gateway signals a duplicate first-certify with JSON-RPC error code
//! -32021, mapped here to `AlreadyCertified` so both backends expose one
//! failure taxonomy.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CertifyRequest, LedgerAdapter, LedgerEntry, LedgerReceipt, RewardRequest};
use crate::types::{ContentHash, EngineError, Result};

/// Gateway error code for a duplicate first certification
const CODE_ALREADY_CERTIFIED: i64 = -32021;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`RegistryLedger`]
#[derive(Debug, Clone)]
pub struct RegistryLedgerConfig {
    /// JSON-RPC endpoint of the contract gateway
    pub rpc_url: String,
    /// Registry contract address, e.g. "0x5FbDB2315678afecb367f032d93F642f64180aa3"
    pub contract_address: String,
    /// Signer key credential forwarded to the gateway
    pub signer_key: String,
    /// Request timeout
    pub timeout: Duration,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    transaction_hash: String,
    block_number: u64,
}

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    content_id: String,
    content_hash: String,
    metadata_cid: String,
    content_type: String,
    license: String,
    contributor: String,
    /// Unix seconds of the anchoring block
    timestamp: i64,
    transaction_hash: String,
    block_number: u64,
}

// ============================================================================
// Adapter
// ============================================================================

/// Live ledger adapter over a registry-contract JSON-RPC gateway
pub struct RegistryLedger {
    config: RegistryLedgerConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RegistryLedger {
    pub fn new(config: RegistryLedgerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("http client build failed: {}", e)))?;
        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.config.rpc_url)
            .bearer_auth(&self.config.signer_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::LedgerUnavailable(format!("{} failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(EngineError::LedgerUnavailable(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| {
            EngineError::LedgerUnavailable(format!("{} response malformed: {}", method, e))
        })?;

        if let Some(error) = parsed.error {
            return Err(map_rpc_error(method, error));
        }
        parsed
            .result
            .ok_or_else(|| EngineError::LedgerUnavailable(format!("{} returned no result", method)))
    }

    fn certify_params(&self, request: &CertifyRequest) -> Value {
        json!([{
            "contract": self.config.contract_address,
            "contentId": request.content_id,
            "contentHash": format!("0x{}", request.content_hash.to_hex()),
            "metadataCid": request.metadata_cid,
            "contentType": request.content_type,
            "license": request.license,
            "contributor": request.contributor,
        }])
    }

    async fn transact(&self, method: &str, params: Value) -> Result<LedgerReceipt> {
        let result = self.rpc_call(method, params).await?;
        let tx: TransactionResult = serde_json::from_value(result).map_err(|e| {
            EngineError::LedgerUnavailable(format!("{} result malformed: {}", method, e))
        })?;
        Ok(LedgerReceipt {
            tx_ref: tx.transaction_hash,
            block_or_sequence: tx.block_number,
        })
    }
}

fn map_rpc_error(method: &str, error: RpcError) -> EngineError {
    if error.code == CODE_ALREADY_CERTIFIED {
        return EngineError::AlreadyCertified(error.message);
    }
    EngineError::LedgerUnavailable(format!(
        "{} rejected by gateway (code {}): {}",
        method, error.code, error.message
    ))
}

fn entry_from_record(record: RegistryRecord) -> Result<LedgerEntry> {
    let hash_hex = record
        .content_hash
        .strip_prefix("0x")
        .unwrap_or(&record.content_hash);
    let content_hash = ContentHash::from_hex(hash_hex)?;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_opt(record.timestamp, 0)
        .single()
        .ok_or_else(|| EngineError::Internal("registry record timestamp out of range".into()))?;

    Ok(LedgerEntry {
        content_id: record.content_id,
        content_hash,
        metadata_cid: record.metadata_cid,
        content_type: record.content_type,
        license: record.license,
        contributor: record.contributor,
        timestamp,
        tx_ref: record.transaction_hash,
        block_or_sequence: record.block_number,
    })
}

#[async_trait::async_trait]
impl LedgerAdapter for RegistryLedger {
    async fn certify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        let receipt = self
            .transact("registry_certify", self.certify_params(request))
            .await?;
        info!(
            content_id = %request.content_id,
            tx_ref = %receipt.tx_ref,
            block = receipt.block_or_sequence,
            "Anchored certification on registry contract"
        );
        Ok(receipt)
    }

    async fn recertify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        let receipt = self
            .transact("registry_recertify", self.certify_params(request))
            .await?;
        info!(
            content_id = %request.content_id,
            tx_ref = %receipt.tx_ref,
            "Recertified on registry contract"
        );
        Ok(receipt)
    }

    async fn lookup(&self, content_id: &str) -> Result<Option<LedgerEntry>> {
        let result = self
            .rpc_call(
                "registry_lookup",
                json!([{
                    "contract": self.config.contract_address,
                    "contentId": content_id,
                }]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }
        let record: RegistryRecord = serde_json::from_value(result).map_err(|e| {
            EngineError::LedgerUnavailable(format!("lookup result malformed: {}", e))
        })?;
        entry_from_record(record).map(Some)
    }

    async fn record_reward(&self, request: &RewardRequest) -> Result<LedgerReceipt> {
        let receipt = self
            .transact(
                "registry_recordReward",
                json!([{
                    "contract": self.config.contract_address,
                    "contributor": request.contributor,
                    "points": request.points,
                    "reason": request.reason,
                }]),
            )
            .await?;
        debug!(
            contributor = %request.contributor,
            points = request.points,
            tx_ref = %receipt.tx_ref,
            "Recorded reward on registry contract"
        );
        Ok(receipt)
    }

    async fn probe(&self) -> Result<()> {
        self.rpc_call("registry_version", json!([]))
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(rpc_url = %self.config.rpc_url, error = %e, "Registry probe failed");
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_certified_code_maps_to_business_error() {
        let err = map_rpc_error(
            "registry_certify",
            RpcError {
                code: CODE_ALREADY_CERTIFIED,
                message: "conte_001".to_string(),
            },
        );
        assert!(matches!(err, EngineError::AlreadyCertified(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_other_codes_map_to_unavailable() {
        let err = map_rpc_error(
            "registry_certify",
            RpcError {
                code: -32000,
                message: "nonce too low".to_string(),
            },
        );
        assert!(matches!(err, EngineError::LedgerUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_entry_from_record_parses_prefixed_hash() {
        let record = RegistryRecord {
            content_id: "conte_001".to_string(),
            content_hash: format!("0x{}", ContentHash::from_bytes([9; 32]).to_hex()),
            metadata_cid: "bafymeta".to_string(),
            content_type: "tale".to_string(),
            license: "CC-BY-SA-4.0".to_string(),
            contributor: "0xABC".to_string(),
            timestamp: 1_722_470_400,
            transaction_hash: "0xdeadbeef".to_string(),
            block_number: 19_000_001,
        };

        let entry = entry_from_record(record).unwrap();
        assert_eq!(entry.content_hash, ContentHash::from_bytes([9; 32]));
        assert_eq!(entry.tx_ref, "0xdeadbeef");
        assert_eq!(entry.block_or_sequence, 19_000_001);
    }

    #[test]
    fn test_entry_from_record_rejects_bad_hash() {
        let record = RegistryRecord {
            content_id: "conte_001".to_string(),
            content_hash: "0x1234".to_string(),
            metadata_cid: String::new(),
            content_type: String::new(),
            license: String::new(),
            contributor: String::new(),
            timestamp: 0,
            transaction_hash: String::new(),
            block_number: 0,
        };
        assert!(entry_from_record(record).is_err());
    }
}
