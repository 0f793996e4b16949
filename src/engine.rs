//! Engine assembly
//!
//! Wires the mode-selected adapters into the orchestrator and reward
//! ledger and exposes the library API the HTTP layer (out of scope here)
//! consumes: certify, verify, distribute rewards, balances and levels.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Args;
use crate::logging::OperationLogger;
use crate::metrics::{EngineMetrics, OpStats};
use crate::mode::ModeController;
use crate::orchestrator::{Certificate, CertificationOrchestrator, VerificationResult};
use crate::retry::{CancelToken, RetryExecutor};
use crate::rewards::{AwardContext, ContributionType, LevelStatus, RewardLedger, RewardRecord};
use crate::types::{ContentHash, ContentSubmission, EngineError, MediaFile, Mode, Result};

/// The assembled certification and reward engine
pub struct Engine {
    orchestrator: CertificationOrchestrator,
    rewards: RewardLedger,
    metrics: Arc<EngineMetrics>,
    mode: Mode,
}

impl Engine {
    /// Start the engine: validate configuration, decide the mode once,
    /// and wire the adapters through shared retry/logging/metrics.
    pub async fn start(args: &Args) -> Result<Self> {
        args.validate().map_err(EngineError::Validation)?;

        let logger = OperationLogger::new(args.instance_id.to_string());
        if let Some(ref path) = args.operations_log {
            if let Err(e) = logger.init_file(path.clone()).await {
                warn!(path = %path.display(), error = %e, "Operation audit log unavailable");
            }
        }

        let metrics = Arc::new(EngineMetrics::new());
        let retry = RetryExecutor::new(args.retry_config());
        let selected = ModeController::initialize(args).await;
        let mode = selected.mode;

        let orchestrator = CertificationOrchestrator::new(
            Arc::clone(&selected.storage),
            Arc::clone(&selected.ledger),
            retry.clone(),
            mode,
            logger.clone(),
            Arc::clone(&metrics),
        );
        let rewards = RewardLedger::new(
            selected.ledger,
            retry,
            logger,
            Arc::clone(&metrics),
        );

        info!(instance_id = %args.instance_id, mode = %mode, "Engine started");
        Ok(Self {
            orchestrator,
            rewards,
            metrics,
            mode,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn orchestrator(&self) -> &CertificationOrchestrator {
        &self.orchestrator
    }

    pub fn rewards(&self) -> &RewardLedger {
        &self.rewards
    }

    /// Certify a submission with optional media attachments
    pub async fn certify_content(
        &self,
        submission: ContentSubmission,
        media: Vec<MediaFile>,
        cancel: &CancelToken,
    ) -> Result<Certificate> {
        self.orchestrator
            .certify_content(submission, media, cancel)
            .await
    }

    /// Verify certified content against an expected hash
    pub async fn verify_content(
        &self,
        content_id: &str,
        expected_hash: ContentHash,
        cancel: &CancelToken,
    ) -> Result<VerificationResult> {
        self.orchestrator
            .verify_content(content_id, expected_hash, cancel)
            .await
    }

    /// Distribute a reward for a contribution event
    ///
    /// `contribution_type` is the SCREAMING_SNAKE_CASE wire form; unknown
    /// kinds fail `UnknownContributionType` before any ledger work.
    pub async fn distribute_reward(
        &self,
        contributor: &str,
        contribution_type: &str,
        ctx: AwardContext,
        cancel: &CancelToken,
    ) -> Result<RewardRecord> {
        let kind = ContributionType::parse(contribution_type)?;
        self.rewards.award(contributor, kind, ctx, cancel).await
    }

    /// Cumulative reward balance for a contributor
    pub async fn balance_of(&self, contributor: &str) -> u64 {
        self.rewards.balance_of(contributor).await
    }

    /// Level standing for a contributor
    pub async fn level_of(&self, contributor: &str) -> LevelStatus {
        self.rewards.level_of(contributor).await
    }

    /// Snapshot of per-operation metrics
    pub fn metrics_snapshot(&self) -> Vec<OpStats> {
        self.metrics.snapshot()
    }
}
