//! Core types shared across the engine
//!
//! Central error taxonomy, the live/demo mode flag, the fixed-length
//! content hash, and the submission types accepted at the library boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Errors
// ============================================================================

/// Error taxonomy for certification and reward operations
///
/// Transient errors (`StorageUnavailable`, `LedgerUnavailable`) are retried
/// by the [`RetryExecutor`](crate::retry::RetryExecutor) and only surfaced
/// after exhaustion. Business-rule errors propagate immediately.
/// A tampered verification is a result value, never an error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller input malformed; never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// Content could not be canonicalized (non-finite numbers, bad payload)
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Content-addressed store unreachable or failing transiently
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Ledger backend unreachable or failing transiently
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// A certification already exists for this content id
    #[error("already certified: {0}")]
    AlreadyCertified(String),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Contribution type absent from the reward rates table
    #[error("unknown contribution type: {0}")]
    UnknownContributionType(String),

    /// Caller-initiated cancellation; distinct from unavailability
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A retried operation exhausted its attempts
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// Invariant violation inside the engine
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this error class is safe and useful to retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::StorageUnavailable(_) | EngineError::LedgerUnavailable(_)
        )
    }
}

// ============================================================================
// Mode
// ============================================================================

/// Whether the engine is anchored to live external services or to
/// in-process demo surrogates
///
/// Decided once at startup by the [`ModeController`](crate::mode::ModeController)
/// and recorded on every certificate so downstream consumers know the
/// trust level of the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// External storage and ledger backends
    Live,
    /// In-process surrogates with an identical contract; non-durable
    Demo,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Demo => write!(f, "demo"),
        }
    }
}

// ============================================================================
// Content hash
// ============================================================================

/// 32-byte SHA-256 digest over the canonical serialization of content
///
/// Serialized as a 64-char lowercase hex string. Identical logical content
/// always yields the identical hash; there is no machine-local salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a 64-char hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| EngineError::Validation(format!("invalid hash hex: {}", e)))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| EngineError::Validation("hash must be 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Submissions
// ============================================================================

/// A content submission presented for certification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSubmission {
    /// Caller-supplied identifier, unique per active certification (≤64 chars)
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// The content body (tale text, transcription, description)
    pub content: String,
    /// Content type (e.g. "tale", "proverb", "song", "recipe")
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Language of the content (e.g. "fr", "bm", "wo")
    #[serde(default)]
    pub language: Option<String>,
    /// Geographic or cultural origin
    #[serde(default)]
    pub origin: Option<String>,
    /// License under which the content is shared
    #[serde(default = "default_license")]
    pub license: String,
    /// Ledger address of the contributor
    pub contributor: String,
}

fn default_content_type() -> String {
    "tale".to_string()
}

fn default_license() -> String {
    "CC-BY-SA-4.0".to_string()
}

/// Maximum length of a content id
pub const MAX_CONTENT_ID_LEN: usize = 64;

impl ContentSubmission {
    /// Validate required fields before any network work is attempted
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(EngineError::Validation("content id is required".to_string()));
        }
        if self.id.len() > MAX_CONTENT_ID_LEN {
            return Err(EngineError::Validation(format!(
                "content id exceeds {} chars",
                MAX_CONTENT_ID_LEN
            )));
        }
        if self.title.is_empty() {
            return Err(EngineError::Validation("title is required".to_string()));
        }
        if self.contributor.is_empty() {
            return Err(EngineError::Validation(
                "contributor address is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A media attachment accompanying a submission
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: bytes::Bytes,
    pub filename: String,
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_hex_round_trip() {
        let hash = ContentHash::from_bytes([0xab; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_content_hash_rejects_bad_hex() {
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_submission_validation() {
        let mut submission = ContentSubmission {
            id: "conte_001".to_string(),
            title: "Le lièvre et la hyène".to_string(),
            content: "Il était une fois...".to_string(),
            content_type: "tale".to_string(),
            language: Some("fr".to_string()),
            origin: Some("Mali".to_string()),
            license: "CC-BY-SA-4.0".to_string(),
            contributor: "0xABC".to_string(),
        };
        assert!(submission.validate().is_ok());

        submission.id = "x".repeat(65);
        assert!(matches!(
            submission.validate(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::StorageUnavailable("down".into()).is_transient());
        assert!(EngineError::LedgerUnavailable("down".into()).is_transient());
        assert!(!EngineError::AlreadyCertified("conte_001".into()).is_transient());
        assert!(!EngineError::Validation("bad".into()).is_transient());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Live).unwrap(), "\"live\"");
        assert_eq!(serde_json::to_string(&Mode::Demo).unwrap(), "\"demo\"");
    }
}
