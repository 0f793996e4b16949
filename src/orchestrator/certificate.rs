//! Certificate and verification result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContentHash, Mode};

/// Lifecycle state of a certification
///
/// `Pending` exists only between anchoring steps inside a certify call;
/// callers observe `Certified` or `Recertified`. Verification is a query
/// and never transitions this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateState {
    Uncertified,
    Pending,
    Certified,
    Recertified,
}

/// A media attachment that failed to pin
///
/// Media failures are per-item and never abort certification on their own;
/// the metadata pin is the required storage anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFailure {
    pub filename: String,
    pub error: String,
}

/// The durable record of a certification act
///
/// Never mutated once anchored; a recertification produces a new
/// Certificate for the same `content_id` and the prior anchor remains
/// reachable as ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub content_id: String,
    pub content_hash: ContentHash,
    pub metadata_cid: String,
    pub media_cids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_failures: Vec<MediaFailure>,
    pub content_type: String,
    pub license: String,
    pub contributor: String,
    pub ledger_tx_ref: String,
    pub block_or_sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Trust level of the anchor; always recorded, never dropped
    pub mode: Mode,
    pub state: CertificateState,
    /// Public gateway URL for the pinned metadata
    pub gateway_url: String,
}

/// Outcome of the storage-integrity half of a verification
///
/// `Unknown` means the check could not run (store unreachable); it is
/// deliberately distinct from a proven `Mismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityCheck {
    Intact,
    Mismatch,
    Unknown,
}

/// Overall verification verdict
///
/// Tampering is a successful verification outcome, not an error: the
/// operation ran and proved something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Verified,
    Tampered,
}

/// Result of verifying certified content against an expected hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub content_id: String,
    /// Ledger hash matches the caller's expected hash
    pub is_authentic: bool,
    /// Pinned metadata still hashes to the ledger hash
    pub ipfs_integrity: IntegrityCheck,
    pub status: VerificationStatus,
    /// Hash anchored on the ledger
    pub ledger_hash: ContentHash,
    /// Hash the caller expected
    pub expected_hash: ContentHash,
    pub checked_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Derive the verdict: verified strictly when authentic and intact
    pub fn derive_status(is_authentic: bool, integrity: IntegrityCheck) -> VerificationStatus {
        if is_authentic && integrity == IntegrityCheck::Intact {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Tampered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_requires_both_checks() {
        assert_eq!(
            VerificationResult::derive_status(true, IntegrityCheck::Intact),
            VerificationStatus::Verified
        );
        assert_eq!(
            VerificationResult::derive_status(true, IntegrityCheck::Mismatch),
            VerificationStatus::Tampered
        );
        assert_eq!(
            VerificationResult::derive_status(true, IntegrityCheck::Unknown),
            VerificationStatus::Tampered
        );
        assert_eq!(
            VerificationResult::derive_status(false, IntegrityCheck::Intact),
            VerificationStatus::Tampered
        );
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Verified).unwrap(),
            "\"VERIFIED\""
        );
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Tampered).unwrap(),
            "\"TAMPERED\""
        );
    }
}
