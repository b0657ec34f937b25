//! # Inbound Ports
//!
//! API trait defining what the verification engine can do.

use async_trait::async_trait;
use shared_types::{Chain, Revision};

use crate::domain::{ChainVerification, VerificationDetail, VerifierError, WalkOptions};

/// Revision verification API - inbound port.
#[async_trait]
pub trait RevisionVerificationApi: Send + Sync {
    /// Verify one revision against its chain key.
    ///
    /// Hash, signature and witness failures land in the returned detail.
    /// Only configuration errors are returned as `Err`.
    async fn verify_revision(
        &self,
        revision: &Revision,
        verification_hash: &str,
        options: WalkOptions,
    ) -> Result<VerificationDetail, VerifierError>;

    /// Walk a whole chain, stopping at the first invalid revision.
    async fn verify_chain(
        &self,
        chain: &Chain,
        options: WalkOptions,
    ) -> Result<ChainVerification, VerifierError>;
}
