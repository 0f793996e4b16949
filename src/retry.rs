//! Bounded retry with exponential backoff
//!
//! Wraps fallible remote operations: sequential attempts, backoff of
//! `min(base * 2^(attempt-1), max)`, per-attempt timeout, and drop-based
//! cancellation. Only transient errors are retried; business-rule
//! rejections propagate immediately. Backoff sleeps hold no locks.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::{EngineError, Result};

// ============================================================================
// Cancellation
// ============================================================================

/// Caller-supplied cancellation token
///
/// Cancellation is drop-based: when the token fires, the in-flight attempt
/// future is dropped and `EngineError::Cancelled` is surfaced, distinct
/// from unavailability.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

/// Handle used to fire a [`CancelToken`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel all linked tokens
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// Create a linked handle/token pair
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx: Some(rx) })
    }

    /// A token that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve when cancellation is requested; pends forever for
    /// [`CancelToken::never`]
    pub async fn cancelled(&self) {
        match &self.rx {
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                // Sender dropped without firing means cancellation can no
                // longer happen; pend forever like `never()`.
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        return;
                    }
                }
                std::future::pending::<()>().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

// ============================================================================
// Retry executor
// ============================================================================

/// Configuration for [`RetryExecutor`]
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts per operation
    pub max_retries: u32,
    /// First backoff delay
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
    /// Per-attempt timeout
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Executes remote operations with bounded exponential-backoff retry
///
/// Every wrapped operation must be safe to repeat: storage `put` and ledger
/// `lookup` are idempotent by construction, and `certify` is only retried
/// before a receipt has been observed.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Backoff before the given attempt (1-based)
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.config.max_delay)
    }

    /// Run `op`, retrying transient failures up to `max_retries` times
    ///
    /// On exhaustion the final transient error is wrapped with the
    /// operation name and attempt count for diagnosability.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled(operation.to_string()));
            }

            let attempt_future = tokio::time::timeout(self.config.attempt_timeout, op());
            let outcome = tokio::select! {
                result = attempt_future => match result {
                    Ok(inner) => inner,
                    Err(_) => Err(timeout_error(operation)),
                },
                _ = cancel.cancelled() => {
                    return Err(EngineError::Cancelled(operation.to_string()));
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    warn!(
                        operation = operation,
                        attempts = attempt,
                        error = %err,
                        "Operation exhausted retries"
                    );
                    return Err(EngineError::RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.backoff_for(attempt);
                    debug!(
                        operation = operation,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(EngineError::Cancelled(operation.to_string()));
                        }
                    }
                }
            }
        }
    }
}

/// Attempt timeouts count as transient unavailability so they share the
/// backoff path. Operations are named `storage.*` / `ledger.*` by
/// convention, which picks the matching taxonomy variant.
fn timeout_error(operation: &str) -> EngineError {
    if operation.starts_with("storage.") {
        EngineError::StorageUnavailable(format!("{} timed out", operation))
    } else {
        EngineError::LedgerUnavailable(format!("{} timed out", operation))
    }
}
