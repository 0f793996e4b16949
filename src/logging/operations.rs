//! Operation audit logging
//!
//! Records `(operation, success, duration_ms, metadata)` events in JSONL
//! format for downstream audit/analytics consumers. File output is
//! optional; events always reach the tracing layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Operation kinds emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Content was certified (first anchor)
    Certified,
    /// Content was recertified (superseding anchor)
    Recertified,
    /// Content was verified against an expected hash
    Verified,
    /// A reward was distributed
    RewardDistributed,
    /// A certification or verification attempt failed
    OperationFailed,
}

/// Audit event for a completed engine operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event kind
    pub kind: OperationKind,
    /// Engine instance that handled the request
    pub instance_id: String,
    /// Operation name (e.g. "certify_content")
    pub operation: String,
    /// Whether the operation succeeded
    pub success: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Content id, when the operation targets one
    pub content_id: Option<String>,
    /// Contributor address, when known
    pub contributor: Option<String>,
    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl OperationEvent {
    /// Create a new operation event
    pub fn new(kind: OperationKind, instance_id: String, operation: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            instance_id,
            operation: operation.to_string(),
            success: true,
            duration_ms: 0,
            content_id: None,
            contributor: None,
            metadata: None,
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_contributor(mut self, contributor: impl Into<String>) -> Self {
        self.contributor = Some(contributor.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger that writes operation events to a JSONL file
#[derive(Clone)]
pub struct OperationLogger {
    inner: Arc<Mutex<OperationLoggerInner>>,
    instance_id: String,
}

struct OperationLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl OperationLogger {
    /// Create a new logger; no file output until [`Self::init_file`]
    pub fn new(instance_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OperationLoggerInner { writer: None })),
            instance_id,
        }
    }

    /// Initialize file logging to the given path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        info!("Operation audit log initialized at {}", path.display());
        Ok(())
    }

    /// Create an event pre-filled with this logger's instance id
    pub fn event(&self, kind: OperationKind, operation: &str) -> OperationEvent {
        OperationEvent::new(kind, self.instance_id.clone(), operation)
    }

    /// Log an operation event
    ///
    /// Serialization or write failures are logged and swallowed; audit
    /// logging never fails an operation.
    pub async fn log(&self, event: OperationEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize operation event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write operation event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush operation log: {}", e);
            }
        }
    }

    /// Get the instance id
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = OperationEvent::new(
            OperationKind::Certified,
            "engine-1".to_string(),
            "certify_content",
        )
        .with_content_id("conte_001")
        .with_contributor("0xABC")
        .with_duration(42);

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("certified"));
        assert!(jsonl.contains("conte_001"));
        assert!(jsonl.contains("\"duration_ms\":42"));
    }

    #[test]
    fn test_failure_event() {
        let event = OperationEvent::new(
            OperationKind::OperationFailed,
            "engine-1".to_string(),
            "verify_content",
        )
        .with_success(false)
        .with_metadata(serde_json::json!({"error": "not found"}));

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("operation_failed"));
        assert!(jsonl.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn test_logging_without_file_is_a_noop() {
        let logger = OperationLogger::new("engine-1".to_string());
        logger
            .log(logger.event(OperationKind::Verified, "verify_content"))
            .await;
    }
}
