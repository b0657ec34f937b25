//! # Verification Service
//!
//! Application service wiring the revision verifier, the backend registry and
//! the reporting sink behind [`RevisionVerificationApi`].

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{Chain, Revision};

use super::backends::WitnessBackends;
use super::chain_walker::ChainWalk;
use super::revision_verifier::RevisionVerifier;
use crate::config::VerifierConfig;
use crate::domain::{ChainVerification, VerificationDetail, VerifierError, WalkOptions};
use crate::ports::{NullReporter, RevisionVerificationApi, VerificationReporter};

/// Verification Service - orchestrates revision and chain verification.
pub struct VerificationService {
    /// Per-revision verifier.
    verifier: RevisionVerifier,
    /// Receives every detail as it is produced.
    reporter: Arc<dyn VerificationReporter>,
    /// Walk defaults from configuration.
    options: WalkOptions,
}

impl VerificationService {
    /// Build a service with every network adapter registered.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, VerifierError> {
        Ok(Self::with_backends(
            WitnessBackends::from_config(config)?,
            config.walk,
        ))
    }

    /// Build a service over an explicit backend registry.
    pub fn with_backends(backends: WitnessBackends, options: WalkOptions) -> Self {
        Self {
            verifier: RevisionVerifier::new(backends),
            reporter: Arc::new(NullReporter),
            options,
        }
    }

    /// Replace the reporting sink.
    pub fn with_reporter(mut self, reporter: Arc<dyn VerificationReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Walk defaults.
    pub fn options(&self) -> WalkOptions {
        self.options
    }

    /// Start a step-wise walk over `chain`, reporting to this service's sink.
    pub fn walk<'a>(&'a self, chain: &'a Chain, options: WalkOptions) -> ChainWalk<'a> {
        ChainWalk::new(&self.verifier, chain, options).with_reporter(self.reporter.as_ref())
    }
}

#[async_trait]
impl RevisionVerificationApi for VerificationService {
    async fn verify_revision(
        &self,
        revision: &Revision,
        verification_hash: &str,
        options: WalkOptions,
    ) -> Result<VerificationDetail, VerifierError> {
        let detail = self
            .verifier
            .verify(revision, verification_hash, options)
            .await?;
        self.reporter.report(&detail);
        Ok(detail)
    }

    async fn verify_chain(
        &self,
        chain: &Chain,
        options: WalkOptions,
    ) -> Result<ChainVerification, VerifierError> {
        self.walk(chain, options).run().await
    }
}
