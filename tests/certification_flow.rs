//! End-to-end certification and reward scenarios in demo mode

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;

use griot::ledger::{
    CertifyRequest, InMemoryLedger, LedgerAdapter, LedgerEntry, LedgerReceipt, RewardRequest,
};
use griot::logging::OperationLogger;
use griot::metrics::EngineMetrics;
use griot::orchestrator::{
    CertificationOrchestrator, IntegrityCheck, VerificationStatus,
};
use griot::retry::{RetryConfig, RetryExecutor};
use griot::rewards::AwardContext;
use griot::storage::{InMemoryStore, StorageAdapter};
use griot::{Args, CancelToken, ContentHash, ContentSubmission, Engine, EngineError, Mode};

fn demo_args() -> Args {
    Args::parse_from(["griot", "--mode", "demo"])
}

fn submission(id: &str, content: &str) -> ContentSubmission {
    ContentSubmission {
        id: id.to_string(),
        title: "Le lièvre et la hyène".to_string(),
        content: content.to_string(),
        content_type: "tale".to_string(),
        language: Some("fr".to_string()),
        origin: Some("Mali".to_string()),
        license: "CC-BY-SA-4.0".to_string(),
        contributor: "0xABC0000000000000000000000000000000000000".to_string(),
    }
}

#[tokio::test]
async fn certify_then_lookup_and_verify() {
    let engine = Engine::start(&demo_args()).await.unwrap();
    let cancel = CancelToken::never();

    let certificate = engine
        .certify_content(
            submission("conte_001", "Il était une fois..."),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

    assert!(!certificate.metadata_cid.is_empty());
    assert_eq!(certificate.mode, Mode::Demo);
    assert!(!certificate.ledger_tx_ref.is_empty());

    let verification = engine
        .verify_content("conte_001", certificate.content_hash, &cancel)
        .await
        .unwrap();
    assert!(verification.is_authentic);
    assert_eq!(verification.ipfs_integrity, IntegrityCheck::Intact);
    assert_eq!(verification.status, VerificationStatus::Verified);
}

#[tokio::test]
async fn double_certify_upserts_to_second_hash() {
    let engine = Engine::start(&demo_args()).await.unwrap();
    let cancel = CancelToken::never();

    let first = engine
        .certify_content(
            submission("conte_001", "Il était une fois..."),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

    // Different content under the same id must not surface AlreadyCertified.
    let second = engine
        .certify_content(
            submission("conte_001", "Dans un village lointain..."),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

    assert_ne!(first.content_hash, second.content_hash);

    // The ledger now reflects the second hash: verifying with the first
    // hash fails authenticity, with the second it passes.
    let stale = engine
        .verify_content("conte_001", first.content_hash, &cancel)
        .await
        .unwrap();
    assert!(!stale.is_authentic);
    assert_eq!(stale.status, VerificationStatus::Tampered);

    let fresh = engine
        .verify_content("conte_001", second.content_hash, &cancel)
        .await
        .unwrap();
    assert!(fresh.is_authentic);
    assert_eq!(fresh.status, VerificationStatus::Verified);
}

#[tokio::test]
async fn verify_missing_id_errors_not_found() {
    let engine = Engine::start(&demo_args()).await.unwrap();

    let err = engine
        .verify_content(
            "missing_id",
            ContentHash::from_bytes([1; 32]),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn reward_quality_scales_and_caps() {
    let engine = Engine::start(&demo_args()).await.unwrap();
    let cancel = CancelToken::never();

    let base = engine
        .distribute_reward(
            "user_1",
            "CONTENT_UPLOAD",
            AwardContext::with_quality(1.0),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(base.points, 10);

    let tripled = engine
        .distribute_reward(
            "user_1",
            "CONTENT_UPLOAD",
            AwardContext::with_quality(3.0),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(tripled.points, 30);

    let capped = engine
        .distribute_reward(
            "user_1",
            "CONTENT_UPLOAD",
            AwardContext::with_quality(5.0),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(capped.points, 30);

    assert_eq!(engine.balance_of("user_1").await, 70);
    let level = engine.level_of("user_1").await;
    assert_eq!(level.current.name, "Newcomer");
    assert!(level.progress_percent > 0.0);
}

#[tokio::test]
async fn balances_and_levels_are_monotonic() {
    let engine = Engine::start(&demo_args()).await.unwrap();
    let cancel = CancelToken::never();

    let mut last_balance = 0;
    let mut last_standing = (0u64, -1.0f64);
    for _ in 0..12 {
        engine
            .distribute_reward(
                "user_1",
                "TRANSLATION",
                AwardContext::with_quality(2.0),
                &cancel,
            )
            .await
            .unwrap();

        let balance = engine.balance_of("user_1").await;
        assert!(balance > last_balance);

        // Progress resets at a level-up, so the (level, progress) pair is
        // what never moves backwards.
        let level = engine.level_of("user_1").await;
        let standing = (level.current.min_points, level.progress_percent);
        assert!(standing > last_standing);
        last_standing = standing;
        last_balance = balance;
    }

    // 12 awards at 30 points each crosses the 100-point threshold.
    assert_eq!(engine.balance_of("user_1").await, 360);
    assert_eq!(engine.level_of("user_1").await.current.name, "Contributor");
}

// ============================================================================
// Demo/live parity
// ============================================================================

/// A mocked live ledger: same records as the demo ledger but with
/// chain-style transaction hashes, standing in for backend B.
struct MockLiveLedger {
    inner: InMemoryLedger,
}

fn live_ref(receipt: LedgerReceipt) -> LedgerReceipt {
    LedgerReceipt {
        tx_ref: format!("0x{:064x}", receipt.block_or_sequence),
        block_or_sequence: receipt.block_or_sequence,
    }
}

#[async_trait::async_trait]
impl LedgerAdapter for MockLiveLedger {
    async fn certify(&self, request: &CertifyRequest) -> Result<LedgerReceipt, EngineError> {
        self.inner.certify(request).await.map(live_ref)
    }
    async fn recertify(&self, request: &CertifyRequest) -> Result<LedgerReceipt, EngineError> {
        self.inner.recertify(request).await.map(live_ref)
    }
    async fn lookup(&self, content_id: &str) -> Result<Option<LedgerEntry>, EngineError> {
        self.inner.lookup(content_id).await
    }
    async fn record_reward(&self, request: &RewardRequest) -> Result<LedgerReceipt, EngineError> {
        self.inner.record_reward(request).await.map(live_ref)
    }
    async fn probe(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

fn orchestrator_with(
    ledger: Arc<dyn LedgerAdapter>,
    mode: Mode,
) -> (CertificationOrchestrator, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = CertificationOrchestrator::new(
        Arc::clone(&store) as Arc<dyn StorageAdapter>,
        ledger,
        RetryExecutor::new(RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            attempt_timeout: Duration::from_secs(5),
        }),
        mode,
        OperationLogger::new("parity-test".to_string()),
        Arc::new(EngineMetrics::new()),
    );
    (orchestrator, store)
}

#[tokio::test]
async fn demo_and_live_certificates_match_except_mode_and_tx_ref() {
    let cancel = CancelToken::never();
    let (demo, _) = orchestrator_with(Arc::new(InMemoryLedger::new()), Mode::Demo);
    let (live, _) = orchestrator_with(
        Arc::new(MockLiveLedger {
            inner: InMemoryLedger::new(),
        }),
        Mode::Live,
    );

    let demo_cert = demo
        .certify_content(
            submission("conte_001", "Il était une fois..."),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();
    let live_cert = live
        .certify_content(
            submission("conte_001", "Il était une fois..."),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

    // Identical except the trust labeling and the backend tx reference.
    assert_eq!(demo_cert.content_hash, live_cert.content_hash);
    assert_eq!(demo_cert.metadata_cid, live_cert.metadata_cid);
    assert_eq!(demo_cert.media_cids, live_cert.media_cids);
    assert_eq!(demo_cert.state, live_cert.state);
    assert_eq!(demo_cert.content_type, live_cert.content_type);
    assert_eq!(demo_cert.license, live_cert.license);
    assert_eq!(demo_cert.contributor, live_cert.contributor);

    assert_eq!(demo_cert.mode, Mode::Demo);
    assert_eq!(live_cert.mode, Mode::Live);
    assert_ne!(demo_cert.ledger_tx_ref, live_cert.ledger_tx_ref);
    assert!(live_cert.ledger_tx_ref.starts_with("0x"));
}

#[tokio::test]
async fn tampered_media_store_degrades_to_mismatch() {
    let cancel = CancelToken::never();
    let (orchestrator, store) = orchestrator_with(Arc::new(InMemoryLedger::new()), Mode::Demo);

    let certificate = orchestrator
        .certify_content(
            submission("conte_002", "La tortue et l'aigle"),
            Vec::new(),
            &cancel,
        )
        .await
        .unwrap();

    store.corrupt(&certificate.metadata_cid, Bytes::from_static(b"{}"));

    let verification = orchestrator
        .verify_content("conte_002", certificate.content_hash, &cancel)
        .await
        .unwrap();
    assert_eq!(verification.ipfs_integrity, IntegrityCheck::Mismatch);
    assert_eq!(verification.status, VerificationStatus::Tampered);
}
