//! Contribution rewards
//!
//! Converts qualifying contribution events into cumulative points recorded
//! through the ledger adapter for auditability. Balances are always folds
//! over the append-only record log, never a mutable counter that could
//! drift from the ledger; levels are a pure function of the balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

use crate::ledger::{LedgerAdapter, RewardRequest};
use crate::logging::{OperationKind, OperationLogger};
use crate::metrics::EngineMetrics;
use crate::retry::{CancelToken, RetryExecutor};
use crate::types::{EngineError, Result};

// ============================================================================
// Contribution types and rates
// ============================================================================

/// Qualifying contribution kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionType {
    ContentUpload,
    Verification,
    Translation,
    Review,
    Curation,
}

impl ContributionType {
    /// Base points for one contribution of this kind
    pub fn base_rate(&self) -> u64 {
        match self {
            ContributionType::ContentUpload => 10,
            ContributionType::Verification => 5,
            ContributionType::Translation => 15,
            ContributionType::Review => 8,
            ContributionType::Curation => 12,
        }
    }

    /// Parse the SCREAMING_SNAKE_CASE wire form
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "CONTENT_UPLOAD" => Ok(ContributionType::ContentUpload),
            "VERIFICATION" => Ok(ContributionType::Verification),
            "TRANSLATION" => Ok(ContributionType::Translation),
            "REVIEW" => Ok(ContributionType::Review),
            "CURATION" => Ok(ContributionType::Curation),
            other => Err(EngineError::UnknownContributionType(other.to_string())),
        }
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContributionType::ContentUpload => "CONTENT_UPLOAD",
            ContributionType::Verification => "VERIFICATION",
            ContributionType::Translation => "TRANSLATION",
            ContributionType::Review => "REVIEW",
            ContributionType::Curation => "CURATION",
        };
        write!(f, "{}", s)
    }
}

/// Quality/multiplier bounds for reward scaling
const MIN_FACTOR: f64 = 1.0;
const MAX_FACTOR: f64 = 3.0;

/// Context accompanying an award
#[derive(Debug, Clone)]
pub struct AwardContext {
    /// Quality factor, clamped to [1, 3]
    pub quality: f64,
    /// Event multiplier, clamped to [1, 3]; defaults to 1
    pub multiplier: f64,
    /// Free-form metadata echoed to the audit log
    pub metadata: Option<serde_json::Value>,
}

impl Default for AwardContext {
    fn default() -> Self {
        Self {
            quality: 1.0,
            multiplier: 1.0,
            metadata: None,
        }
    }
}

impl AwardContext {
    pub fn with_quality(quality: f64) -> Self {
        Self {
            quality,
            ..Default::default()
        }
    }
}

/// Compute the points for an award
///
/// `floor(base * clamp(quality, 1, 3) * clamp(multiplier, 1, 3))`.
pub fn points_for(contribution_type: ContributionType, ctx: &AwardContext) -> u64 {
    let quality = ctx.quality.clamp(MIN_FACTOR, MAX_FACTOR);
    let multiplier = ctx.multiplier.clamp(MIN_FACTOR, MAX_FACTOR);
    (contribution_type.base_rate() as f64 * quality * multiplier).floor() as u64
}

// ============================================================================
// Records and levels
// ============================================================================

/// Append-only record of one distributed reward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRecord {
    pub contributor: String,
    pub points: u64,
    pub contribution_type: ContributionType,
    pub reason: String,
    pub ledger_tx_ref: String,
    pub timestamp: DateTime<Utc>,
}

/// A named contribution level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    pub name: &'static str,
    /// Inclusive lower bound in points
    pub min_points: u64,
}

/// Ordered, total level table: every non-negative balance maps to exactly
/// one level, and levels are monotonic in points.
pub const LEVELS: [Level; 5] = [
    Level { name: "Newcomer", min_points: 0 },
    Level { name: "Contributor", min_points: 100 },
    Level { name: "Storyteller", min_points: 500 },
    Level { name: "Curator", min_points: 1000 },
    Level { name: "Guardian", min_points: 2500 },
];

/// Level standing for a contributor
#[derive(Debug, Clone, Serialize)]
pub struct LevelStatus {
    pub current: Level,
    /// Next level, absent at the top tier
    pub next: Option<Level>,
    /// Progress toward the next level, clamped to 100 at the top tier
    pub progress_percent: f64,
}

/// Map a point balance onto the level table
pub fn level_for(points: u64) -> LevelStatus {
    let index = LEVELS
        .iter()
        .rposition(|level| points >= level.min_points)
        .unwrap_or(0);
    let current = LEVELS[index];
    let next = LEVELS.get(index + 1).copied();

    let progress_percent = match next {
        Some(next_level) => {
            let span = (next_level.min_points - current.min_points) as f64;
            ((points - current.min_points) as f64 / span) * 100.0
        }
        None => 100.0,
    };

    LevelStatus {
        current,
        next,
        progress_percent,
    }
}

// ============================================================================
// Reward ledger
// ============================================================================

/// Distributes rewards and derives balances and levels
pub struct RewardLedger {
    ledger: Arc<dyn LedgerAdapter>,
    retry: RetryExecutor,
    logger: OperationLogger,
    metrics: Arc<EngineMetrics>,
    /// Append-only in-process mirror of distributed rewards; balances are
    /// recomputed from it on every read
    records: RwLock<Vec<RewardRecord>>,
}

impl RewardLedger {
    pub fn new(
        ledger: Arc<dyn LedgerAdapter>,
        retry: RetryExecutor,
        logger: OperationLogger,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            ledger,
            retry,
            logger,
            metrics,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Distribute a reward for one contribution event
    ///
    /// Fails `UnknownContributionType` for kinds outside the rates table
    /// and `Validation` when the computed amount is zero; a zero award is
    /// never silently recorded.
    pub async fn award(
        &self,
        contributor: &str,
        contribution_type: ContributionType,
        ctx: AwardContext,
        cancel: &CancelToken,
    ) -> Result<RewardRecord> {
        if contributor.is_empty() {
            return Err(EngineError::Validation(
                "contributor address is required".to_string(),
            ));
        }

        let points = points_for(contribution_type, &ctx);
        if points == 0 {
            return Err(EngineError::Validation(
                "computed reward amount is zero".to_string(),
            ));
        }

        let started = Instant::now();
        let reason = contribution_type.to_string();
        let receipt = self
            .retry
            .execute("ledger.record_reward", cancel, || {
                let ledger = Arc::clone(&self.ledger);
                let request = RewardRequest {
                    contributor: contributor.to_string(),
                    points,
                    reason: reason.clone(),
                };
                async move { ledger.record_reward(&request).await }
            })
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let receipt = match receipt {
            Ok(receipt) => receipt,
            Err(err) => {
                self.metrics
                    .record("rewards", "award", false, duration_ms);
                self.logger
                    .log(
                        self.logger
                            .event(OperationKind::OperationFailed, "award")
                            .with_contributor(contributor)
                            .with_success(false)
                            .with_duration(duration_ms)
                            .with_metadata(json!({"error": err.to_string()})),
                    )
                    .await;
                return Err(err);
            }
        };

        let record = RewardRecord {
            contributor: contributor.to_string(),
            points,
            contribution_type,
            reason,
            ledger_tx_ref: receipt.tx_ref,
            timestamp: Utc::now(),
        };
        self.records.write().await.push(record.clone());

        self.metrics.record("rewards", "award", true, duration_ms);
        self.logger
            .log(
                self.logger
                    .event(OperationKind::RewardDistributed, "award")
                    .with_contributor(contributor)
                    .with_duration(duration_ms)
                    .with_metadata(json!({
                        "points": points,
                        "contribution_type": contribution_type,
                        "metadata": ctx.metadata,
                    })),
            )
            .await;

        info!(
            contributor = %record.contributor,
            points = record.points,
            contribution_type = %record.contribution_type,
            tx_ref = %record.ledger_tx_ref,
            "Reward distributed"
        );
        Ok(record)
    }

    /// Cumulative points: a fold over the append-only records
    pub async fn balance_of(&self, contributor: &str) -> u64 {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.contributor == contributor)
            .map(|record| record.points)
            .sum()
    }

    /// Level standing derived from the balance
    pub async fn level_of(&self, contributor: &str) -> LevelStatus {
        level_for(self.balance_of(contributor).await)
    }

    /// All records for a contributor, oldest first
    pub async fn records_of(&self, contributor: &str) -> Vec<RewardRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.contributor == contributor)
            .cloned()
            .collect()
    }
}
