//! # Revision Verifier
//!
//! Verifies one revision's internal consistency.
//!
//! ## Order of checks
//!
//! 1. File hash (fatal)
//! 2. Content hash (fatal)
//! 3. Metadata hash (fatal)
//! 4. Signature and witness are mutually exclusive (fatal)
//! 5. Signature or witness, attesting the predecessor's verification hash
//! 6. Verification hash recomputed from the four components
//!
//! Only a configuration problem (unknown network, unregistered backend) is
//! returned as an error. Everything else lands in the detail.

use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use shared_types::{FileContent, Revision, RevisionWitness};
use tracing::{debug, info, warn};

use super::backends::WitnessBackends;
use crate::algorithms::{
    content_hash, digest_bytes, metadata_hash, verification_hash, verify_merkle_integrity,
    witness_event_hash, SignatureVerifier,
};
use crate::domain::{
    AttestationStatus, MerkleProofStatus, RevisionFailure, VerificationDetail,
    VerificationOutcome, VerifierError, WalkOptions, WitnessNetwork, WitnessReport,
};

/// Composes hashing, signatures, witness backends and Merkle proofs.
#[derive(Debug, Clone)]
pub struct RevisionVerifier {
    backends: WitnessBackends,
    signatures: SignatureVerifier,
}

impl RevisionVerifier {
    /// Create a verifier over `backends`.
    pub fn new(backends: WitnessBackends) -> Self {
        Self {
            backends,
            signatures: SignatureVerifier::new(),
        }
    }

    /// Verify `revision` stored under the chain key `key`.
    pub async fn verify(
        &self,
        revision: &Revision,
        key: &str,
        options: WalkOptions,
    ) -> Result<VerificationDetail, VerifierError> {
        let started = Instant::now();
        let mut detail = VerificationDetail::new(key);
        detail.content = Some(revision.content.clone());

        self.check(revision, key, options, &mut detail)
            .await?;

        detail.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if detail.is_correct() {
            // Raw payloads are only kept to diagnose failures.
            detail.content = None;
        }

        info!(
            revision = %Revision::short_hash(key),
            status = ?detail.status,
            elapsed_ms = detail.elapsed_ms,
            "[aqua] Revision verified"
        );
        Ok(detail)
    }

    async fn check(
        &self,
        revision: &Revision,
        key: &str,
        options: WalkOptions,
        detail: &mut VerificationDetail,
    ) -> Result<(), VerifierError> {
        let content = &revision.content;
        let metadata = &revision.metadata;

        if let Some(file) = &content.file {
            let result = check_file(file);
            detail.checks.file = Some(result.is_ok());
            trace_check(options, "file", result.is_ok());
            if let Err(failure) = result {
                detail.fail(failure);
                return Ok(());
            }
        }

        let recomputed_content = content_hash(&content.content);
        detail.checks.content = recomputed_content == content.content_hash;
        trace_check(options, "content", detail.checks.content);
        if !detail.checks.content {
            detail.fail(RevisionFailure::ContentHashMismatch);
            return Ok(());
        }

        let recomputed_metadata = metadata_hash(
            &metadata.domain_id,
            &metadata.time_stamp,
            &metadata.previous_verification_hash,
            metadata.merge_hash.as_deref().unwrap_or_default(),
        );
        detail.checks.metadata = recomputed_metadata == metadata.metadata_hash;
        trace_check(options, "metadata", detail.checks.metadata);
        if !detail.checks.metadata {
            detail.fail(RevisionFailure::MetadataHashMismatch);
            return Ok(());
        }

        let target = revision.previous_verification_hash();
        let (signature_component, witness_component) = match (&revision.signature, &revision.witness) {
            (Some(_), Some(_)) => {
                warn!(
                    revision = %Revision::short_hash(key),
                    "[aqua] Revision carries both a signature and a witness"
                );
                detail.fail(RevisionFailure::SignatureAndWitness);
                return Ok(());
            }
            (Some(signature), None) => {
                match self.signatures.verify(signature, target) {
                    Ok(()) => detail.checks.signature = AttestationStatus::Valid,
                    Err(e) => {
                        detail.checks.signature = AttestationStatus::Invalid;
                        detail.fail(RevisionFailure::SignatureInvalid(e.to_string()));
                    }
                }
                trace_check(options, "signature", detail.checks.signature.is_ok());
                (signature.signature_hash.as_str(), "")
            }
            (None, Some(witness)) => {
                let (ok, report) = self.verify_witness(witness, target, options).await?;
                detail.checks.witness = AttestationStatus::from_ok(ok);
                trace_check(options, "witness", ok);
                if !ok {
                    detail.fail(RevisionFailure::WitnessInvalid(witness_failure_reason(&report)));
                }
                detail.witness = Some(report);
                ("", witness.witness_hash.as_str())
            }
            (None, None) => ("", ""),
        };

        let recomputed = verification_hash(
            &recomputed_content,
            &recomputed_metadata,
            signature_component,
            witness_component,
        );
        let declared_ok = revision
            .verification_hash
            .as_deref()
            .map_or(true, |declared| declared == key);
        detail.checks.verification = recomputed == key && declared_ok;
        trace_check(options, "verification", detail.checks.verification);
        if !detail.checks.verification {
            detail.fail(RevisionFailure::VerificationHashMismatch);
        }

        Ok(())
    }

    /// Verify a witness over `target`, returning `(ok, report)`.
    async fn verify_witness(
        &self,
        witness: &RevisionWitness,
        target: &str,
        options: WalkOptions,
    ) -> Result<(bool, WitnessReport), VerifierError> {
        let network = WitnessNetwork::parse(&witness.witness_network)?;
        let backend = self.backends.get(network.kind())?;

        let actual = witness_event_hash(&witness.domain_snapshot_genesis_hash, &witness.merkle_root);
        let mut report = WitnessReport {
            witness_hash_matches: actual == witness.witness_event_verification_hash,
            actual_event_verification_hash: actual,
            witness_event_verification_hash: witness.witness_event_verification_hash.clone(),
            domain_snapshot_genesis_hash: witness.domain_snapshot_genesis_hash.clone(),
            merkle_root: witness.merkle_root.clone(),
            witness_network: witness.witness_network.clone(),
            witness_event_transaction_hash: witness.witness_event_transaction_hash.clone(),
            lookup_outcome: None,
            lookup_error: None,
            merkle_proof_status: None,
        };

        if !report.witness_hash_matches {
            debug!("[aqua] Witness event verification hash mismatch, skipping lookup");
            return Ok((false, report));
        }

        let outcome = match backend
            .verify(
                network,
                &witness.witness_event_transaction_hash,
                &report.actual_event_verification_hash,
                witness.witness_timestamp,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(network = %network, error = %e, "[aqua] Witness lookup failed");
                e.into_outcome()
            }
        };
        let lookup_ok = outcome.is_match();
        report.lookup_error = outcome.reason().map(str::to_string);
        report.lookup_outcome = Some(outcome);

        let proof_ok = if options.verify_merkle_proof {
            let status = if target == witness.domain_snapshot_genesis_hash {
                MerkleProofStatus::DomainSnapshot
            } else if verify_merkle_integrity(&witness.structured_merkle_proof, target) {
                MerkleProofStatus::Valid
            } else {
                MerkleProofStatus::Invalid
            };
            report.merkle_proof_status = Some(status);
            status.is_ok()
        } else {
            true
        };

        Ok((lookup_ok && proof_ok, report))
    }
}

/// Hash the decoded file bytes against the declared hash.
fn check_file(file: &FileContent) -> Result<(), RevisionFailure> {
    let declared = file
        .file_hash
        .as_deref()
        .ok_or(RevisionFailure::FileHashMissing)?;
    let bytes = STANDARD
        .decode(file.data.trim())
        .map_err(|_| RevisionFailure::FileHashMismatch)?;
    if digest_bytes(&bytes) != declared {
        return Err(RevisionFailure::FileHashMismatch);
    }
    Ok(())
}

fn witness_failure_reason(report: &WitnessReport) -> String {
    if !report.witness_hash_matches {
        return "Witness event verification hash mismatch".to_string();
    }
    match (&report.lookup_outcome, report.merkle_proof_status) {
        (Some(VerificationOutcome::Mismatch), _) => {
            "Anchored commitment does not match".to_string()
        }
        (Some(outcome), _) if !outcome.is_match() => {
            report.lookup_error.clone().unwrap_or_default()
        }
        (_, Some(MerkleProofStatus::Invalid)) => "Merkle proof invalid".to_string(),
        _ => "Witness not confirmed".to_string(),
    }
}

fn trace_check(options: WalkOptions, check: &str, ok: bool) {
    if options.verbose {
        info!(check, ok, "[aqua] Check");
    } else {
        debug!(check, ok, "[aqua] Check");
    }
}
