//! # Chain Walker
//!
//! Walks a chain from genesis to tip, verifying one revision at a time.
//!
//! ## Walk Rules
//!
//! - Revisions are visited strictly in order, one at a time
//! - Each revision's `previous_verification_hash` must equal the key of the
//!   revision before it (`""` for genesis); a broken link fails the revision
//!   without running its checks
//! - The walk stops after the first failed revision
//! - Cancellation is observed between revisions, never inside one
//!
//! Details are handed to the reporter as they are produced, so a caller can
//! show progress before the walk completes.

use futures_util::stream::{self, Stream};
use shared_types::{Chain, Hash, Revision};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::revision_verifier::RevisionVerifier;
use crate::domain::{
    ChainVerification, RevisionFailure, VerificationDetail, VerifierError, WalkOptions,
};
use crate::ports::{NullReporter, VerificationReporter};

/// An in-progress walk over one chain.
pub struct ChainWalk<'a> {
    verifier: &'a RevisionVerifier,
    chain: &'a Chain,
    options: WalkOptions,
    reporter: &'a dyn VerificationReporter,
    cancel: Option<watch::Receiver<bool>>,
    position: usize,
    verified: usize,
    previous: Hash,
    finished: bool,
}

impl<'a> ChainWalk<'a> {
    /// Start a walk over `chain`.
    pub fn new(verifier: &'a RevisionVerifier, chain: &'a Chain, options: WalkOptions) -> Self {
        Self {
            verifier,
            chain,
            options,
            reporter: &NullReporter,
            cancel: None,
            position: 0,
            verified: 0,
            previous: Hash::new(),
            finished: false,
        }
    }

    /// Send every detail to `reporter` as it is produced.
    pub fn with_reporter(mut self, reporter: &'a dyn VerificationReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Abort the walk once `cancel` turns `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Revisions in the chain.
    pub fn total(&self) -> usize {
        self.chain.len()
    }

    /// Verify the next revision.
    ///
    /// Returns `None` once the tip was verified or a revision failed.
    pub async fn next(&mut self) -> Option<Result<VerificationDetail, VerifierError>> {
        if self.finished {
            return None;
        }

        if self.is_cancelled() {
            self.finished = true;
            warn!(verified = self.verified, "[aqua] Chain walk cancelled");
            return Some(Err(VerifierError::Cancelled {
                verified: self.verified,
            }));
        }

        let Some((key, revision)) = self.chain.get_index(self.position) else {
            self.finished = true;
            return None;
        };
        self.position += 1;

        let detail = match self.step(key, revision).await {
            Ok(detail) => detail,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        self.reporter.report(&detail);
        if detail.is_correct() {
            self.verified += 1;
            self.previous = key.clone();
        } else {
            self.finished = true;
            info!(
                position = self.position,
                total = self.total(),
                revision = %Revision::short_hash(key),
                "[aqua] Walk stopped at first failed revision"
            );
        }

        Some(Ok(detail))
    }

    async fn step(
        &self,
        key: &Hash,
        revision: &Revision,
    ) -> Result<VerificationDetail, VerifierError> {
        let declared = revision.previous_verification_hash();
        let linked = if self.position == 1 {
            revision.is_genesis()
        } else {
            declared == self.previous
        };
        if !linked {
            debug!(
                revision = %Revision::short_hash(key),
                "[aqua] Predecessor link broken"
            );
            let mut detail = VerificationDetail::new(key.as_str());
            detail.link_ok = false;
            detail.fail(RevisionFailure::BrokenLink {
                expected: self.previous.clone(),
                actual: declared.to_string(),
            });
            return Ok(detail);
        }

        self.verifier.verify(revision, key, self.options).await
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Turn the walk into a stream of details.
    pub fn into_stream(self) -> impl Stream<Item = Result<VerificationDetail, VerifierError>> + 'a {
        stream::unfold(self, |mut walk| async move {
            let item = walk.next().await?;
            Some((item, walk))
        })
    }

    /// Drive the walk to completion and aggregate the result.
    pub async fn run(mut self) -> Result<ChainVerification, VerifierError> {
        let total = self.total();
        info!(total, "[aqua] Verifying chain");

        let mut details = Vec::with_capacity(total);
        while let Some(detail) = self.next().await {
            details.push(detail?);
        }

        let result = ChainVerification::from_details(details, total);
        info!(
            status = %result.status,
            verified = result.verified_count,
            total,
            "[aqua] Chain verification complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{content_hash, metadata_hash, verification_hash};
    use crate::application::backends::WitnessBackends;
    use crate::domain::ChainStatus;
    use crate::ports::MockReporter;
    use futures_util::StreamExt;
    use shared_types::{ContentSlots, RevisionContent, RevisionMetadata};

    fn chain_of(texts: &[&str]) -> Chain {
        let mut chain = Chain::new();
        let mut previous = String::new();
        for text in texts {
            let mut slots = ContentSlots::new();
            slots.insert("main".into(), (*text).into());
            let c = content_hash(&slots);
            let m = metadata_hash("domain", "20240101000000", &previous, "");
            let v = verification_hash(&c, &m, "", "");
            let revision = Revision {
                verification_hash: None,
                content: RevisionContent {
                    content: slots,
                    content_hash: c,
                    file: None,
                },
                metadata: RevisionMetadata {
                    domain_id: "domain".into(),
                    time_stamp: "20240101000000".into(),
                    previous_verification_hash: previous.clone(),
                    merge_hash: None,
                    metadata_hash: m,
                },
                signature: None,
                witness: None,
            };
            chain.push(v.clone(), revision).unwrap();
            previous = v;
        }
        chain
    }

    fn verifier() -> RevisionVerifier {
        RevisionVerifier::new(WitnessBackends::new())
    }

    #[tokio::test]
    async fn test_valid_chain_verifies() {
        let chain = chain_of(&["one", "two", "three"]);
        let verifier = verifier();
        let result = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(result.status, ChainStatus::Verified);
        assert_eq!(result.verified_count, 3);
        assert_eq!(result.details.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_chain_is_norecord() {
        let chain = Chain::new();
        let verifier = verifier();
        let result = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(result.status, ChainStatus::NoRecord);
        assert!(result.details.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut chain = chain_of(&["one", "two", "three"]);
        let (key, revision) = chain.get_index(1).map(|(k, r)| (k.clone(), r.clone())).unwrap();
        let mut tampered = Chain::new();
        for (k, r) in chain.iter() {
            let r = if *k == key {
                let mut r = revision.clone();
                r.content.content.insert("main".into(), "forged".into());
                r
            } else {
                r.clone()
            };
            tampered.push(k.clone(), r).unwrap();
        }
        chain = tampered;

        let verifier = verifier();
        let reporter = MockReporter::default();
        let result = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .with_reporter(&reporter)
            .run()
            .await
            .unwrap();

        assert_eq!(result.status, ChainStatus::Invalid);
        assert_eq!(result.details.len(), 2);
        assert_eq!(result.verified_count, 1);
        assert_eq!(reporter.reported_hashes().len(), 2);
        assert_eq!(reporter.reported_hashes()[1], key);
    }

    #[tokio::test]
    async fn test_broken_link_skips_checks() {
        let first = chain_of(&["one"]);
        let second = chain_of(&["two"]);
        let mut chain = Chain::new();
        for (k, r) in first.iter().chain(second.iter()) {
            chain.push(k.clone(), r.clone()).unwrap();
        }

        let verifier = verifier();
        let result = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .run()
            .await
            .unwrap();
        let detail = &result.details[1];
        assert!(!detail.link_ok);
        assert!(!detail.checks.content);
        assert!(matches!(detail.failure, Some(RevisionFailure::BrokenLink { .. })));
    }

    #[tokio::test]
    async fn test_first_revision_must_be_genesis() {
        let full = chain_of(&["one", "two"]);
        let (key, revision) = full.get_index(1).unwrap();
        let mut chain = Chain::new();
        chain.push(key.clone(), revision.clone()).unwrap();

        let verifier = verifier();
        let result = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(result.status, ChainStatus::Invalid);
        assert!(!result.details[0].link_ok);
        assert!(matches!(
            &result.details[0].failure,
            Some(RevisionFailure::BrokenLink { expected, .. }) if expected.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_cancellation_between_revisions() {
        let chain = chain_of(&["one", "two"]);
        let verifier = verifier();
        let (tx, rx) = watch::channel(false);
        let mut walk =
            ChainWalk::new(&verifier, &chain, WalkOptions::default()).with_cancellation(rx);

        assert!(walk.next().await.unwrap().is_ok());
        tx.send(true).unwrap();
        assert!(matches!(
            walk.next().await,
            Some(Err(VerifierError::Cancelled { verified: 1 }))
        ));
        assert!(walk.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let chain = chain_of(&["one", "two", "three"]);
        let verifier = verifier();
        let hashes: Vec<String> = ChainWalk::new(&verifier, &chain, WalkOptions::default())
            .into_stream()
            .map(|d| d.unwrap().verification_hash)
            .collect()
            .await;
        let keys: Vec<String> = chain.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(hashes, keys);
    }
}
