//! # Domain Entities
//!
//! Per-revision verification results and the aggregated chain result.
//!
//! ## Clusters
//!
//! - **Statuses**: `AttestationStatus`, `RevisionStatus`, `MerkleProofStatus`, `ChainStatus`
//! - **Per revision**: `CheckStatus`, `WitnessReport`, `RevisionFailure`, `VerificationDetail`
//! - **Per chain**: `ChainVerification`

use serde::{Deserialize, Serialize};
use shared_types::{Hash, RevisionContent};
use thiserror::Error;

use super::value_objects::VerificationOutcome;

// =============================================================================
// CLUSTER A: STATUSES
// =============================================================================

/// Tri-state status of the signature or witness of a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttestationStatus {
    /// The revision carries no attestation of this kind.
    Missing,
    /// The attestation checked out.
    Valid,
    /// The attestation failed.
    Invalid,
}

impl AttestationStatus {
    /// `Missing` counts as ok: an absent attestation never fails a revision.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// `Valid` when `ok`, otherwise `Invalid`.
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// Overall status of one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    /// Every check passed.
    Verified,
    /// At least one check failed.
    Invalid,
}

/// Result of the rigorous Merkle proof check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerkleProofStatus {
    /// The target is the snapshot root itself, so no proof is needed.
    DomainSnapshot,
    /// The proof chains the target up to the root.
    Valid,
    /// The proof is empty or broken.
    Invalid,
}

impl MerkleProofStatus {
    /// Whether the proof does not fail the witness.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

/// Aggregate status of a chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    /// No revision was verified.
    #[serde(rename = "NORECORD")]
    NoRecord,
    /// Every revision was verified.
    #[serde(rename = "VERIFIED")]
    Verified,
    /// The walk stopped before the end of the chain.
    #[serde(rename = "INVALID")]
    Invalid,
}

impl ChainStatus {
    /// Aggregate `verified` successes out of `total` revisions.
    pub fn aggregate(verified: usize, total: usize) -> Self {
        if verified == 0 {
            Self::NoRecord
        } else if verified == total {
            Self::Verified
        } else {
            Self::Invalid
        }
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRecord => "NORECORD",
            Self::Verified => "VERIFIED",
            Self::Invalid => "INVALID",
        }
    }
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLUSTER B: PER-REVISION RESULT
// =============================================================================

/// Individual check results of one revision.
///
/// Checks that were skipped because an earlier fatal check failed keep their
/// default value (`false` / `Missing`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    /// File hash check, `None` when the revision wraps no file.
    pub file: Option<bool>,
    /// Content hash check.
    pub content: bool,
    /// Metadata hash check.
    pub metadata: bool,
    /// Signature status.
    pub signature: AttestationStatus,
    /// Witness status.
    pub witness: AttestationStatus,
    /// Verification hash self-consistency.
    pub verification: bool,
}

impl Default for CheckStatus {
    fn default() -> Self {
        Self {
            file: None,
            content: false,
            metadata: false,
            signature: AttestationStatus::Missing,
            witness: AttestationStatus::Missing,
            verification: false,
        }
    }
}

/// Diagnostic report for a witness revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessReport {
    /// Whether the recomputed event hash equals the declared one.
    pub witness_hash_matches: bool,
    /// Recomputed `digest(genesis ‖ merkle_root)`.
    pub actual_event_verification_hash: Hash,
    /// Declared event hash.
    pub witness_event_verification_hash: Hash,
    /// Snapshot root event.
    pub domain_snapshot_genesis_hash: Hash,
    /// Anchored Merkle root.
    pub merkle_root: Hash,
    /// Network tag.
    pub witness_network: String,
    /// External reference.
    pub witness_event_transaction_hash: String,
    /// Backend outcome, `None` when the lookup was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_outcome: Option<VerificationOutcome>,
    /// Reason attached to a failed lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_error: Option<String>,
    /// Rigorous proof status, `None` when not requested or skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_proof_status: Option<MerkleProofStatus>,
}

/// Why a revision failed. Only the first failure is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RevisionFailure {
    /// The wrapped file carries no declared hash.
    #[error("File hash missing")]
    FileHashMissing,
    /// File bytes do not match the declared hash, or cannot be decoded.
    #[error("File hash mismatch")]
    FileHashMismatch,
    /// Recomputed content hash differs.
    #[error("Content hash mismatch")]
    ContentHashMismatch,
    /// Recomputed metadata hash differs.
    #[error("Metadata hash mismatch")]
    MetadataHashMismatch,
    /// Both signature and witness are present.
    #[error("Revision carries both a signature and a witness")]
    SignatureAndWitness,
    /// Signature did not verify.
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),
    /// Witness did not verify.
    #[error("Invalid witness: {0}")]
    WitnessInvalid(String),
    /// Recomputed verification hash differs from the chain key.
    #[error("Verification hash mismatch")]
    VerificationHashMismatch,
    /// Predecessor link does not point at the previous revision.
    #[error("Broken chain link: expected {expected}, got {actual}")]
    BrokenLink {
        /// Verification hash of the previous revision.
        expected: Hash,
        /// Declared predecessor.
        actual: Hash,
    },
}

/// Per-revision output of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDetail {
    /// Chain key of the revision.
    pub verification_hash: Hash,
    /// Overall status.
    pub status: RevisionStatus,
    /// Individual checks.
    pub checks: CheckStatus,
    /// Whether the predecessor link holds.
    pub link_ok: bool,
    /// First failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RevisionFailure>,
    /// Wall time spent on this revision.
    pub elapsed_ms: u64,
    /// Witness diagnostics on witness paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<WitnessReport>,
    /// Raw content payload; dropped once the revision verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<RevisionContent>,
}

impl VerificationDetail {
    /// A passing detail for `verification_hash` with every check unset.
    pub fn new(verification_hash: impl Into<Hash>) -> Self {
        Self {
            verification_hash: verification_hash.into(),
            status: RevisionStatus::Verified,
            checks: CheckStatus::default(),
            link_ok: true,
            failure: None,
            elapsed_ms: 0,
            witness: None,
            content: None,
        }
    }

    /// Whether the revision verified.
    pub fn is_correct(&self) -> bool {
        self.status == RevisionStatus::Verified
    }

    /// Record `failure` unless an earlier one is already recorded.
    pub fn fail(&mut self, failure: RevisionFailure) {
        self.status = RevisionStatus::Invalid;
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }
}

// =============================================================================
// CLUSTER C: CHAIN RESULT
// =============================================================================

/// Aggregated result of a chain walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Aggregate status.
    pub status: ChainStatus,
    /// Details in chain order, up to and including the first failure.
    pub details: Vec<VerificationDetail>,
    /// Revisions that verified.
    pub verified_count: usize,
    /// Revisions in the chain.
    pub total: usize,
}

impl ChainVerification {
    /// Build the aggregate from the details a walk produced.
    pub fn from_details(details: Vec<VerificationDetail>, total: usize) -> Self {
        let verified_count = details.iter().filter(|d| d.is_correct()).count();
        Self {
            status: ChainStatus::aggregate(verified_count, total),
            details,
            verified_count,
            total,
        }
    }

    /// One-line summary for reports.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {}/{} revision(s) verified",
            self.status, self.verified_count, self.total
        );
        if let Some(failure) = self.details.iter().find_map(|d| {
            d.failure
                .as_ref()
                .map(|f| (shared_types::Revision::short_hash(&d.verification_hash), f))
        }) {
            line.push_str(&format!(", stopped at {}: {}", failure.0, failure.1));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(status: RevisionStatus) -> VerificationDetail {
        VerificationDetail {
            status,
            ..VerificationDetail::new("ab".repeat(64))
        }
    }

    #[test]
    fn test_status_aggregation() {
        assert_eq!(ChainStatus::aggregate(0, 0), ChainStatus::NoRecord);
        assert_eq!(ChainStatus::aggregate(3, 3), ChainStatus::Verified);
        assert_eq!(ChainStatus::aggregate(2, 3), ChainStatus::Invalid);
        assert_eq!(ChainStatus::aggregate(0, 3), ChainStatus::NoRecord);
    }

    #[test]
    fn test_chain_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChainStatus::NoRecord).unwrap(),
            "\"NORECORD\""
        );
        assert_eq!(ChainStatus::Verified.to_string(), "VERIFIED");
    }

    #[test]
    fn test_attestation_status() {
        assert!(AttestationStatus::Missing.is_ok());
        assert!(AttestationStatus::Valid.is_ok());
        assert!(!AttestationStatus::Invalid.is_ok());
        assert_eq!(AttestationStatus::from_ok(false), AttestationStatus::Invalid);
    }

    #[test]
    fn test_fail_keeps_first_failure() {
        let mut d = detail(RevisionStatus::Verified);
        d.fail(RevisionFailure::ContentHashMismatch);
        d.fail(RevisionFailure::VerificationHashMismatch);
        assert!(!d.is_correct());
        assert_eq!(d.failure, Some(RevisionFailure::ContentHashMismatch));
    }

    #[test]
    fn test_summary_names_failure() {
        let mut bad = detail(RevisionStatus::Verified);
        bad.fail(RevisionFailure::MetadataHashMismatch);
        let result =
            ChainVerification::from_details(vec![detail(RevisionStatus::Verified), bad], 3);
        assert_eq!(result.status, ChainStatus::Invalid);
        assert_eq!(result.verified_count, 1);
        let summary = result.summary();
        assert!(summary.starts_with("INVALID: 1/3"));
        assert!(summary.contains("Metadata hash mismatch"));
    }
}
