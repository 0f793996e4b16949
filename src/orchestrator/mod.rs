//! Certification orchestration
//!
//! Drives a certification request through hash → store → anchor in strict
//! order, with upsert semantics at this boundary even though the ledger
//! itself is append-only: a duplicate first-certify transparently becomes a
//! recertification. Verification runs the flow in reverse and reports
//! tampering as a result value, never as an error.
//!
//! Concurrency: requests are independent; the only shared state is the
//! ephemeral certificate cache and the per-content-id lock registry. A
//! per-id async mutex serializes the anchor step for one id, and the
//! ledger's own uniqueness constraint (surfacing as `AlreadyCertified`)
//! absorbs races against external writers — the losing call is upgraded to
//! a recertification, so no write is lost.

pub mod certificate;

pub use certificate::{
    Certificate, CertificateState, IntegrityCheck, MediaFailure, VerificationResult,
    VerificationStatus,
};

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::hasher;
use crate::ledger::{CertifyRequest, LedgerAdapter, LedgerReceipt};
use crate::logging::{OperationKind, OperationLogger};
use crate::metrics::EngineMetrics;
use crate::retry::{CancelToken, RetryExecutor};
use crate::storage::StorageAdapter;
use crate::types::{
    ContentHash, ContentSubmission, EngineError, MediaFile, Mode, Result,
};

/// Field name under which the content hash is embedded in pinned metadata
const HASH_FIELD: &str = "content_hash";

/// Coordinates hashing, storage pinning, and ledger anchoring
pub struct CertificationOrchestrator {
    storage: Arc<dyn StorageAdapter>,
    ledger: Arc<dyn LedgerAdapter>,
    retry: RetryExecutor,
    mode: Mode,
    logger: OperationLogger,
    metrics: Arc<EngineMetrics>,
    /// Best-effort local cache; the ledger is the source of truth in live
    /// mode and this map is explicitly non-durable
    certificates: DashMap<String, Certificate>,
    /// Per-content-id anchor locks
    id_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CertificationOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        ledger: Arc<dyn LedgerAdapter>,
        retry: RetryExecutor,
        mode: Mode,
        logger: OperationLogger,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            storage,
            ledger,
            retry,
            mode,
            logger,
            metrics,
            certificates: DashMap::new(),
            id_locks: DashMap::new(),
        }
    }

    /// The mode every certificate from this orchestrator is labeled with
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Cached certificate for a content id, if this process created one
    pub fn certificate_of(&self, content_id: &str) -> Option<Certificate> {
        self.certificates
            .get(content_id)
            .map(|entry| entry.value().clone())
    }

    fn lock_for(&self, content_id: &str) -> Arc<Mutex<()>> {
        self.id_locks
            .entry(content_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Canonical content value: submission fields plus pinned media CIDs
    fn canonical_content(submission: &ContentSubmission, media_cids: &[String]) -> Value {
        json!({
            "id": submission.id,
            "title": submission.title,
            "content": submission.content,
            "content_type": submission.content_type,
            "language": submission.language,
            "origin": submission.origin,
            "license": submission.license,
            "contributor": submission.contributor,
            "media": media_cids,
        })
    }

    /// Pin all media attachments in parallel; failures are per-item
    async fn pin_media(
        &self,
        media: Vec<MediaFile>,
        cancel: &CancelToken,
    ) -> (Vec<String>, Vec<MediaFailure>) {
        let uploads = media.into_iter().map(|file| {
            let retry = self.retry.clone();
            let storage = Arc::clone(&self.storage);
            let cancel = cancel.clone();
            async move {
                let filename = file.filename.clone();
                let result = retry
                    .execute("storage.put_media", &cancel, || {
                        let storage = Arc::clone(&storage);
                        let bytes = file.bytes.clone();
                        let mime = file.mime_type.clone();
                        async move { storage.put(bytes, &mime).await }
                    })
                    .await;
                (filename, result)
            }
        });

        let mut cids = Vec::new();
        let mut failures = Vec::new();
        for (filename, result) in join_all(uploads).await {
            match result {
                Ok(cid) => {
                    self.metrics.record("storage", "put_media", true, 0);
                    cids.push(cid);
                }
                Err(err) => {
                    warn!(filename = %filename, error = %err, "Media pin failed");
                    self.metrics.record("storage", "put_media", false, 0);
                    failures.push(MediaFailure {
                        filename,
                        error: err.to_string(),
                    });
                }
            }
        }
        (cids, failures)
    }

    /// Certify a content submission
    ///
    /// Strict step order: validate → pin media → hash → pin metadata →
    /// anchor. Either every required anchor succeeds or the call fails with
    /// the first unrecoverable error; no partial Certificate escapes.
    pub async fn certify_content(
        &self,
        submission: ContentSubmission,
        media: Vec<MediaFile>,
        cancel: &CancelToken,
    ) -> Result<Certificate> {
        let started = Instant::now();
        let result = self.certify_inner(&submission, media, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(certificate) => {
                let kind = if certificate.state == CertificateState::Recertified {
                    OperationKind::Recertified
                } else {
                    OperationKind::Certified
                };
                self.metrics
                    .record("orchestrator", "certify_content", true, duration_ms);
                self.logger
                    .log(
                        self.logger
                            .event(kind, "certify_content")
                            .with_content_id(&certificate.content_id)
                            .with_contributor(&certificate.contributor)
                            .with_duration(duration_ms)
                            .with_metadata(json!({
                                "tx_ref": certificate.ledger_tx_ref,
                                "mode": certificate.mode,
                            })),
                    )
                    .await;
            }
            Err(err) => {
                self.metrics
                    .record("orchestrator", "certify_content", false, duration_ms);
                self.logger
                    .log(
                        self.logger
                            .event(OperationKind::OperationFailed, "certify_content")
                            .with_content_id(&submission.id)
                            .with_success(false)
                            .with_duration(duration_ms)
                            .with_metadata(json!({"error": err.to_string()})),
                    )
                    .await;
            }
        }
        result
    }

    async fn certify_inner(
        &self,
        submission: &ContentSubmission,
        media: Vec<MediaFile>,
        cancel: &CancelToken,
    ) -> Result<Certificate> {
        submission.validate()?;

        let (media_cids, media_failures) = self.pin_media(media, cancel).await;

        let canonical = Self::canonical_content(submission, &media_cids);
        let content_hash = hasher::hash(&canonical)?;

        // Metadata document embeds the hash; the canonical serialization is
        // what gets pinned so a verifier can recompute byte-for-byte.
        let mut metadata_doc = canonical;
        metadata_doc[HASH_FIELD] = Value::String(content_hash.to_hex());
        let metadata_bytes = Bytes::from(hasher::canonical_json(&metadata_doc)?);

        let metadata_cid = self
            .retry
            .execute("storage.put_metadata", cancel, || {
                let storage = Arc::clone(&self.storage);
                let bytes = metadata_bytes.clone();
                async move { storage.put(bytes, "application/json").await }
            })
            .await?;
        debug!(content_id = %submission.id, metadata_cid = %metadata_cid, "Metadata pinned");

        let request = CertifyRequest {
            content_id: submission.id.clone(),
            content_hash,
            metadata_cid: metadata_cid.clone(),
            content_type: submission.content_type.clone(),
            license: submission.license.clone(),
            contributor: submission.contributor.clone(),
        };

        let lock = self.lock_for(&submission.id);
        let _guard = lock.lock().await;
        let (receipt, state) = self.anchor(&request, cancel).await?;

        let certificate = Certificate {
            content_id: submission.id.clone(),
            content_hash,
            metadata_cid: metadata_cid.clone(),
            media_cids,
            media_failures,
            content_type: submission.content_type.clone(),
            license: submission.license.clone(),
            contributor: submission.contributor.clone(),
            ledger_tx_ref: receipt.tx_ref,
            block_or_sequence: receipt.block_or_sequence,
            timestamp: Utc::now(),
            mode: self.mode,
            state,
            gateway_url: self.storage.gateway_url(&metadata_cid),
        };

        info!(
            content_id = %certificate.content_id,
            content_hash = %certificate.content_hash,
            tx_ref = %certificate.ledger_tx_ref,
            mode = %certificate.mode,
            state = ?certificate.state,
            "Content certified"
        );
        self.certificates
            .insert(certificate.content_id.clone(), certificate.clone());
        Ok(certificate)
    }

    /// Anchor on the ledger, upgrading a duplicate first-certify
    ///
    /// `AlreadyCertified` first triggers reconciliation via `lookup`: if the
    /// existing record already carries our exact hash and CID (an earlier
    /// attempt whose acknowledgement was lost), that anchor is reused
    /// instead of blindly re-anchoring. Otherwise the call becomes a
    /// recertification.
    async fn anchor(
        &self,
        request: &CertifyRequest,
        cancel: &CancelToken,
    ) -> Result<(LedgerReceipt, CertificateState)> {
        let certify_result = self
            .retry
            .execute("ledger.certify", cancel, || {
                let ledger = Arc::clone(&self.ledger);
                let request = request.clone();
                async move { ledger.certify(&request).await }
            })
            .await;

        match certify_result {
            Ok(receipt) => Ok((receipt, CertificateState::Certified)),
            Err(EngineError::AlreadyCertified(_)) => {
                let existing = self
                    .retry
                    .execute("ledger.lookup", cancel, || {
                        let ledger = Arc::clone(&self.ledger);
                        let content_id = request.content_id.clone();
                        async move { ledger.lookup(&content_id).await }
                    })
                    .await?;

                if let Some(entry) = existing {
                    if entry.content_hash == request.content_hash
                        && entry.metadata_cid == request.metadata_cid
                    {
                        debug!(
                            content_id = %request.content_id,
                            tx_ref = %entry.tx_ref,
                            "Reconciled lost certify acknowledgement via lookup"
                        );
                        return Ok((
                            LedgerReceipt {
                                tx_ref: entry.tx_ref,
                                block_or_sequence: entry.block_or_sequence,
                            },
                            CertificateState::Certified,
                        ));
                    }
                }

                debug!(content_id = %request.content_id, "Falling back to recertify");
                let receipt = self
                    .retry
                    .execute("ledger.recertify", cancel, || {
                        let ledger = Arc::clone(&self.ledger);
                        let request = request.clone();
                        async move { ledger.recertify(&request).await }
                    })
                    .await?;
                Ok((receipt, CertificateState::Recertified))
            }
            Err(other) => Err(other),
        }
    }

    /// Verify certified content against an expected hash
    ///
    /// A tampered outcome is a successful response; only an absent record
    /// (`NotFound`) or backend unavailability is an error.
    pub async fn verify_content(
        &self,
        content_id: &str,
        expected_hash: ContentHash,
        cancel: &CancelToken,
    ) -> Result<VerificationResult> {
        let started = Instant::now();
        let result = self.verify_inner(content_id, expected_hash, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(verification) => {
                self.metrics
                    .record("orchestrator", "verify_content", true, duration_ms);
                self.logger
                    .log(
                        self.logger
                            .event(OperationKind::Verified, "verify_content")
                            .with_content_id(content_id)
                            .with_duration(duration_ms)
                            .with_metadata(json!({
                                "status": verification.status,
                                "ipfs_integrity": verification.ipfs_integrity,
                            })),
                    )
                    .await;
            }
            Err(err) => {
                self.metrics
                    .record("orchestrator", "verify_content", false, duration_ms);
                self.logger
                    .log(
                        self.logger
                            .event(OperationKind::OperationFailed, "verify_content")
                            .with_content_id(content_id)
                            .with_success(false)
                            .with_duration(duration_ms)
                            .with_metadata(json!({"error": err.to_string()})),
                    )
                    .await;
            }
        }
        result
    }

    async fn verify_inner(
        &self,
        content_id: &str,
        expected_hash: ContentHash,
        cancel: &CancelToken,
    ) -> Result<VerificationResult> {
        let entry = self
            .retry
            .execute("ledger.lookup", cancel, || {
                let ledger = Arc::clone(&self.ledger);
                let content_id = content_id.to_string();
                async move { ledger.lookup(&content_id).await }
            })
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no certification for {}", content_id)))?;

        let is_authentic = entry.content_hash == expected_hash;

        let fetched = self
            .retry
            .execute("storage.get_metadata", cancel, || {
                let storage = Arc::clone(&self.storage);
                let cid = entry.metadata_cid.clone();
                async move { storage.get(&cid).await }
            })
            .await;

        let ipfs_integrity = match fetched {
            Ok(bytes) => match Self::recompute_hash(&bytes) {
                // Unparseable or hash-stripped metadata is proven tampering,
                // not an inability to check.
                Err(_) => IntegrityCheck::Mismatch,
                Ok(recomputed) if recomputed == entry.content_hash => IntegrityCheck::Intact,
                Ok(_) => IntegrityCheck::Mismatch,
            },
            Err(err) => {
                warn!(
                    content_id = %content_id,
                    metadata_cid = %entry.metadata_cid,
                    error = %err,
                    "Could not fetch pinned metadata; integrity unknown"
                );
                IntegrityCheck::Unknown
            }
        };

        Ok(VerificationResult {
            content_id: content_id.to_string(),
            is_authentic,
            ipfs_integrity,
            status: VerificationResult::derive_status(is_authentic, ipfs_integrity),
            ledger_hash: entry.content_hash,
            expected_hash,
            checked_at: Utc::now(),
        })
    }

    /// Recompute the content hash from pinned metadata bytes
    ///
    /// The embedded hash field is stripped before hashing, inverting what
    /// `certify_content` pinned.
    fn recompute_hash(metadata_bytes: &[u8]) -> Result<ContentHash> {
        let mut doc: Value = serde_json::from_slice(metadata_bytes)
            .map_err(|e| EngineError::Encoding(format!("pinned metadata is not JSON: {}", e)))?;
        let map = doc
            .as_object_mut()
            .ok_or_else(|| EngineError::Encoding("pinned metadata is not an object".into()))?;
        if map.remove(HASH_FIELD).is_none() {
            return Err(EngineError::Encoding(
                "pinned metadata missing embedded hash".into(),
            ));
        }
        hasher::hash(&doc)
    }
}
