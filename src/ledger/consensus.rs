//! Consensus-topic ledger backend (backend A)
//!
//! Anchors certifications on an append-only consensus topic and mints a
//! uniquely-numbered token per certification, through the mirror/bridge
//! REST service that fronts the consensus network:
//!
//! - `POST /topics/{topic}/messages` — append a base64 message, returns
//!   the topic sequence number and transaction id
//! - `POST /tokens/{token}/mint` — mint one serial whose metadata points
//!   at the metadata CID
//! - `GET  /topics/{topic}/records/{content_id}` — indexed read of the
//!   latest certification record for a content id (404 when absent)
//!
//! `tx_ref` is `"{topic}/{sequence}#{serial}"` for certifications and
//! `"{topic}/{sequence}"` for reward events. The topic is append-only by
//! construction; recertification simply appends a superseding record.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CertifyRequest, LedgerAdapter, LedgerEntry, LedgerReceipt, RewardRequest};
use crate::types::{ContentHash, EngineError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`ConsensusLedger`]
#[derive(Debug, Clone)]
pub struct ConsensusLedgerConfig {
    /// Mirror/bridge REST base URL, e.g. "https://bridge.example.org"
    pub base_url: String,
    /// Certification topic identifier, e.g. "0.0.48120"
    pub topic_id: String,
    /// Token (collection) identifier used for certification serials
    pub token_id: String,
    /// Operator account identifier
    pub operator_id: String,
    /// Operator key, sent as a bearer credential to the bridge
    pub operator_key: String,
    /// Request timeout
    pub timeout: Duration,
}

// ============================================================================
// Wire types
// ============================================================================

/// Message payload appended to the topic (base64-wrapped on the wire)
#[derive(Debug, Serialize, Deserialize)]
struct TopicRecord {
    kind: String,
    content_id: Option<String>,
    content_hash: Option<String>,
    metadata_cid: Option<String>,
    content_type: Option<String>,
    license: Option<String>,
    contributor: String,
    points: Option<u64>,
    reason: Option<String>,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SubmitMessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubmitMessageResponse {
    sequence_number: u64,
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MintBody {
    metadata: String,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    serial: u64,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    sequence_number: u64,
    message: String,
    #[serde(default)]
    serial: Option<u64>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Live ledger adapter over a consensus topic + token-mint bridge
pub struct ConsensusLedger {
    config: ConsensusLedgerConfig,
    client: reqwest::Client,
}

impl ConsensusLedger {
    pub fn new(config: ConsensusLedgerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("http client build failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.config.operator_key)
            .header("X-Operator-Id", &self.config.operator_id)
    }

    async fn submit_message(&self, record: &TopicRecord) -> Result<SubmitMessageResponse> {
        let json = serde_json::to_vec(record)
            .map_err(|e| EngineError::Encoding(format!("topic record serialization: {}", e)))?;
        let body = SubmitMessageBody {
            message: general_purpose::STANDARD.encode(json),
        };

        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/topics/{}/messages", self.config.topic_id))),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::LedgerUnavailable(format!("topic submit failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::LedgerUnavailable(format!(
                "topic submit returned HTTP {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            EngineError::LedgerUnavailable(format!("topic submit response malformed: {}", e))
        })
    }

    async fn mint_serial(&self, metadata_cid: &str) -> Result<u64> {
        let body = MintBody {
            metadata: general_purpose::STANDARD.encode(metadata_cid.as_bytes()),
        };

        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/tokens/{}/mint", self.config.token_id))),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::LedgerUnavailable(format!("token mint failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::LedgerUnavailable(format!(
                "token mint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: MintResponse = response.json().await.map_err(|e| {
            EngineError::LedgerUnavailable(format!("token mint response malformed: {}", e))
        })?;
        Ok(parsed.serial)
    }

    async fn anchor(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        let record = TopicRecord {
            kind: "certification".to_string(),
            content_id: Some(request.content_id.clone()),
            content_hash: Some(request.content_hash.to_hex()),
            metadata_cid: Some(request.metadata_cid.clone()),
            content_type: Some(request.content_type.clone()),
            license: Some(request.license.clone()),
            contributor: request.contributor.clone(),
            points: None,
            reason: None,
            recorded_at: Utc::now(),
        };

        let submitted = self.submit_message(&record).await?;
        let serial = self.mint_serial(&request.metadata_cid).await?;

        let receipt = LedgerReceipt {
            tx_ref: format!(
                "{}/{}#{}",
                self.config.topic_id, submitted.sequence_number, serial
            ),
            block_or_sequence: submitted.sequence_number,
        };
        info!(
            content_id = %request.content_id,
            tx_ref = %receipt.tx_ref,
            transaction_id = ?submitted.transaction_id,
            "Anchored certification on consensus topic"
        );
        Ok(receipt)
    }

    fn decode_record(&self, content_id: &str, response: RecordResponse) -> Result<LedgerEntry> {
        let raw = general_purpose::STANDARD
            .decode(&response.message)
            .map_err(|e| {
                EngineError::Internal(format!("topic message is not valid base64: {}", e))
            })?;
        let record: TopicRecord = serde_json::from_slice(&raw)
            .map_err(|e| EngineError::Internal(format!("topic message malformed: {}", e)))?;

        let content_hash = record
            .content_hash
            .as_deref()
            .ok_or_else(|| EngineError::Internal("topic record missing content_hash".into()))
            .and_then(ContentHash::from_hex)?;

        let tx_ref = match response.serial {
            Some(serial) => format!(
                "{}/{}#{}",
                self.config.topic_id, response.sequence_number, serial
            ),
            None => format!("{}/{}", self.config.topic_id, response.sequence_number),
        };

        Ok(LedgerEntry {
            content_id: content_id.to_string(),
            content_hash,
            metadata_cid: record.metadata_cid.unwrap_or_default(),
            content_type: record.content_type.unwrap_or_default(),
            license: record.license.unwrap_or_default(),
            contributor: record.contributor,
            timestamp: record.recorded_at,
            tx_ref,
            block_or_sequence: response.sequence_number,
        })
    }
}

#[async_trait::async_trait]
impl LedgerAdapter for ConsensusLedger {
    async fn certify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        // The topic itself has no uniqueness constraint; the indexed read
        // provides it, so a duplicate first-certify is rejected before any
        // message is appended.
        if self.lookup(&request.content_id).await?.is_some() {
            return Err(EngineError::AlreadyCertified(request.content_id.clone()));
        }
        self.anchor(request).await
    }

    async fn recertify(&self, request: &CertifyRequest) -> Result<LedgerReceipt> {
        self.anchor(request).await
    }

    async fn lookup(&self, content_id: &str) -> Result<Option<LedgerEntry>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/topics/{}/records/{}",
                self.config.topic_id, content_id
            )))
            .send()
            .await
            .map_err(|e| EngineError::LedgerUnavailable(format!("record lookup failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(EngineError::LedgerUnavailable(format!(
                "record lookup returned HTTP {}",
                response.status()
            )));
        }

        let parsed: RecordResponse = response.json().await.map_err(|e| {
            EngineError::LedgerUnavailable(format!("record response malformed: {}", e))
        })?;
        self.decode_record(content_id, parsed).map(Some)
    }

    async fn record_reward(&self, request: &RewardRequest) -> Result<LedgerReceipt> {
        let record = TopicRecord {
            kind: "reward".to_string(),
            content_id: None,
            content_hash: None,
            metadata_cid: None,
            content_type: None,
            license: None,
            contributor: request.contributor.clone(),
            points: Some(request.points),
            reason: Some(request.reason.clone()),
            recorded_at: Utc::now(),
        };

        let submitted = self.submit_message(&record).await?;
        debug!(
            contributor = %request.contributor,
            points = request.points,
            sequence = submitted.sequence_number,
            "Appended reward event to consensus topic"
        );
        Ok(LedgerReceipt {
            tx_ref: format!("{}/{}", self.config.topic_id, submitted.sequence_number),
            block_or_sequence: submitted.sequence_number,
        })
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url(&format!("/topics/{}", self.config.topic_id)))
            .send()
            .await
            .map_err(|e| {
                warn!(base_url = %self.config.base_url, error = %e, "Consensus probe failed");
                EngineError::LedgerUnavailable(format!("probe failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(EngineError::LedgerUnavailable(format!(
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

    fn test_config() -> ConsensusLedgerConfig {
        ConsensusLedgerConfig {
            base_url: "https://bridge.example.org/".to_string(),
            topic_id: "0.0.48120".to_string(),
            token_id: "0.0.48121".to_string(),
            operator_id: "0.0.9001".to_string(),
            operator_key: "test-key".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_url_joining_strips_trailing_slash() {
        let ledger = ConsensusLedger::new(test_config()).unwrap();
        assert_eq!(
            ledger.url("/topics/0.0.48120/messages"),
            "https://bridge.example.org/topics/0.0.48120/messages"
        );
    }

    #[test]
    fn test_decode_record_round_trip() {
        let ledger = ConsensusLedger::new(test_config()).unwrap();

        let record = TopicRecord {
            kind: "certification".to_string(),
            content_id: Some("conte_001".to_string()),
            content_hash: Some(ContentHash::from_bytes([7; 32]).to_hex()),
            metadata_cid: Some("bafymeta".to_string()),
            content_type: Some("tale".to_string()),
            license: Some("CC-BY-SA-4.0".to_string()),
            contributor: "0xABC".to_string(),
            points: None,
            reason: None,
            recorded_at: Utc::now(),
        };
        let message = general_purpose::STANDARD.encode(serde_json::to_vec(&record).unwrap());

        let entry = ledger
            .decode_record(
                "conte_001",
                RecordResponse {
                    sequence_number: 42,
                    message,
                    serial: Some(7),
                },
            )
            .unwrap();

        assert_eq!(entry.content_hash, ContentHash::from_bytes([7; 32]));
        assert_eq!(entry.tx_ref, "0.0.48120/42#7");
        assert_eq!(entry.block_or_sequence, 42);
        assert_eq!(entry.metadata_cid, "bafymeta");
    }

    #[test]
    fn test_decode_record_rejects_bad_base64() {
        let ledger = ConsensusLedger::new(test_config()).unwrap();
        let err = ledger
            .decode_record(
                "conte_001",
                RecordResponse {
                    sequence_number: 1,
                    message: "not base64 !!".to_string(),
                    serial: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }
}
