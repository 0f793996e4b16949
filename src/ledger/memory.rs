//! In-memory demo ledger
//!
//! Process-lifetime surrogate satisfying the exact [`LedgerAdapter`]
//! contract, including `AlreadyCertified` on duplicate certify. Records are
//! kept as per-id append-only history vectors; `lookup` returns the latest
//! entry. Transaction references are deterministic pseudo-refs derived by
//! hashing `(content_id, content_hash, timestamp)` so a given demo run is
//! reproducible and refs are visibly non-authoritative. Not durable across
//! restarts.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CertifyRequest, LedgerAdapter, LedgerEntry, LedgerReceipt, RewardRequest};
use crate::hasher::sha256_hex;
use crate::types::{EngineError, Result};

/// A reward event as retained by the demo ledger's audit log
#[derive(Debug, Clone)]
pub struct DemoRewardEvent {
    pub contributor: String,
    pub points: u64,
    pub reason: String,
    pub tx_ref: String,
}

/// In-process ledger with per-id append-only history
pub struct InMemoryLedger {
    records: DashMap<String, Vec<LedgerEntry>>,
    rewards: RwLock<Vec<DemoRewardEvent>>,
    sequence: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            rewards: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Deterministic pseudo transaction reference
    fn demo_tx_ref(content_id: &str, payload: &str, timestamp: &str) -> String {
        let digest = sha256_hex(format!("{}|{}|{}", content_id, payload, timestamp).as_bytes());
        format!("demo-{}", &digest[..16])
    }

    fn entry_for(&self, request: &CertifyRequest) -> (LedgerEntry, LedgerReceipt) {
        let timestamp = Utc::now();
        let sequence = self.next_sequence();
        let tx_ref = Self::demo_tx_ref(
            &request.content_id,
            &request.content_hash.to_hex(),
            &timestamp.to_rfc3339(),
        );
        let entry = LedgerEntry {
            content_id: request.content_id.clone(),
            content_hash: request.content_hash,
            metadata_cid: request.metadata_cid.clone(),
            content_type: request.content_type.clone(),
            license: request.license.clone(),
            contributor: request.contributor.clone(),
            timestamp,
            tx_ref: tx_ref.clone(),
            block_or_sequence: sequence,
        };
        let receipt = LedgerReceipt {
            tx_ref,
            block_or_sequence: sequence,
        };
        (entry, receipt)
    }

    /// Full certification history for a content id (newest last)
    pub fn history(&self, content_id: &str) -> Vec<LedgerEntry> {
        self.records
            .get(content_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    /// All reward events appended so far
    pub async fn reward_events(&self) -> Vec<DemoRewardEvent> {
        self.rewards.read().await.clone()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerAdapter for InMemoryLedger {
    async fn certify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        // Entry API keeps check-then-insert atomic under concurrent certify
        // for the same id; exactly one caller wins.
        let mut slot = self.records.entry(request.content_id.clone()).or_default();
        if !slot.is_empty() {
            return Err(EngineError::AlreadyCertified(request.content_id.clone()));
        }
        let (entry, receipt) = self.entry_for(request);
        debug!(
            content_id = %request.content_id,
            tx_ref = %receipt.tx_ref,
            "Demo ledger certified"
        );
        slot.push(entry);
        Ok(receipt)
    }

    async fn recertify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        let (entry, receipt) = self.entry_for(request);
        debug!(
            content_id = %request.content_id,
            tx_ref = %receipt.tx_ref,
            "Demo ledger recertified"
        );
        self.records
            .entry(request.content_id.clone())
            .or_default()
            .push(entry);
        Ok(receipt)
    }

    async fn lookup(&self, content_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self
            .records
            .get(content_id)
            .and_then(|entries| entries.value().last().cloned()))
    }

    async fn record_reward(&self, request: &RewardRequest) -> Result<LedgerReceipt> {
        let timestamp = Utc::now();
        let sequence = self.next_sequence();
        let tx_ref = Self::demo_tx_ref(
            &request.contributor,
            &format!("{}:{}", request.points, request.reason),
            &timestamp.to_rfc3339(),
        );

        self.rewards.write().await.push(DemoRewardEvent {
            contributor: request.contributor.clone(),
            points: request.points,
            reason: request.reason.clone(),
            tx_ref: tx_ref.clone(),
        });

        Ok(LedgerReceipt {
            tx_ref,
            block_or_sequence: sequence,
        })
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentHash;

    fn request(id: &str, hash_byte: u8) -> CertifyRequest {
        CertifyRequest {
            content_id: id.to_string(),
            content_hash: ContentHash::from_bytes([hash_byte; 32]),
            metadata_cid: "bafymeta".to_string(),
            content_type: "tale".to_string(),
            license: "CC-BY-SA-4.0".to_string(),
            contributor: "0xABC".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_certify_is_rejected() {
        let ledger = InMemoryLedger::new();
        ledger.certify(&request("conte_001", 1)).await.unwrap();

        let err = ledger.certify(&request("conte_001", 2)).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyCertified(_)));
    }

    #[tokio::test]
    async fn test_recertify_appends_history_and_lookup_sees_latest() {
        let ledger = InMemoryLedger::new();
        ledger.certify(&request("conte_001", 1)).await.unwrap();
        ledger.recertify(&request("conte_001", 2)).await.unwrap();

        let latest = ledger.lookup("conte_001").await.unwrap().unwrap();
        assert_eq!(latest.content_hash, ContentHash::from_bytes([2; 32]));
        assert_eq!(ledger.history("conte_001").len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_absent_is_none_not_error() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.lookup("missing_id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sequences_are_monotonic() {
        let ledger = InMemoryLedger::new();
        let first = ledger.certify(&request("a", 1)).await.unwrap();
        let second = ledger.certify(&request("b", 1)).await.unwrap();
        assert!(second.block_or_sequence > first.block_or_sequence);
    }

    #[tokio::test]
    async fn test_concurrent_first_certify_has_one_winner() {
        use std::sync::Arc;

        let ledger = Arc::new(InMemoryLedger::new());
        let mut handles = Vec::new();
        for i in 0..8u8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.certify(&request("conte_race", i)).await
            }));
        }

        let mut winners = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(EngineError::AlreadyCertified(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(duplicates, 7);
    }

    #[tokio::test]
    async fn test_reward_events_are_appended() {
        let ledger = InMemoryLedger::new();
        ledger
            .record_reward(&RewardRequest {
                contributor: "user_1".to_string(),
                points: 10,
                reason: "CONTENT_UPLOAD".to_string(),
            })
            .await
            .unwrap();

        let events = ledger.reward_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].points, 10);
        assert!(events[0].tx_ref.starts_with("demo-"));
    }
}
