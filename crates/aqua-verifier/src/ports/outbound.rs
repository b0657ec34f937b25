//! # Outbound Ports
//!
//! Traits for external dependencies: witness networks and the reporting sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{
    BackendKind, VerificationDetail, VerificationOutcome, WitnessError, WitnessNetwork,
    WitnessReceipt,
};

/// Witness network backend - outbound port.
///
/// One implementation per [`BackendKind`]. The network passed in selects the
/// concrete chain or relay where a kind spans several.
#[async_trait]
pub trait WitnessBackend: Send + Sync {
    /// Kind served by this backend.
    fn kind(&self) -> BackendKind;

    /// Anchor `event_hash` and return the external reference.
    async fn witness(
        &self,
        network: WitnessNetwork,
        event_hash: &str,
    ) -> Result<WitnessReceipt, WitnessError>;

    /// Check that `reference` anchors `expected_commitment`.
    ///
    /// `Ok` carries `Match`, `Mismatch` or `NotFound`. Transport and protocol
    /// failures are returned as `Err` and classified by the caller.
    async fn verify(
        &self,
        network: WitnessNetwork,
        reference: &str,
        expected_commitment: &str,
        expected_timestamp: Option<i64>,
    ) -> Result<VerificationOutcome, WitnessError>;
}

/// Reporting sink - outbound port.
///
/// Receives each detail as soon as it is produced.
pub trait VerificationReporter: Send + Sync {
    /// Called once per verified revision, in chain order.
    fn report(&self, detail: &VerificationDetail);
}

/// Reporter that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl VerificationReporter for NullReporter {
    fn report(&self, _detail: &VerificationDetail) {}
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock witness backend for testing.
#[derive(Clone)]
pub struct MockWitnessBackend {
    /// Kind to advertise.
    pub kind: BackendKind,
    /// Outcome returned when the commitment matches `anchored`.
    pub outcome: VerificationOutcome,
    /// Commitment the mock claims is anchored; `None` matches anything.
    pub anchored: Option<String>,
    /// Should return transport errors?
    pub should_fail: bool,
    /// Number of `verify` calls seen.
    pub lookups: Arc<AtomicUsize>,
}

impl Default for MockWitnessBackend {
    fn default() -> Self {
        Self {
            kind: BackendKind::OnChain,
            outcome: VerificationOutcome::Match,
            anchored: None,
            should_fail: false,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockWitnessBackend {
    /// Mock serving `kind` that matches every lookup.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Mock returning `outcome` for every lookup.
    pub fn with_outcome(kind: BackendKind, outcome: VerificationOutcome) -> Self {
        Self {
            kind,
            outcome,
            ..Default::default()
        }
    }

    /// Number of `verify` calls seen so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WitnessBackend for MockWitnessBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn witness(
        &self,
        network: WitnessNetwork,
        event_hash: &str,
    ) -> Result<WitnessReceipt, WitnessError> {
        if self.should_fail {
            return Err(WitnessError::Unreachable("Mock failure".to_string()));
        }

        Ok(WitnessReceipt {
            reference: format!("mock-{}-{}", network, shared_types::Revision::short_hash(event_hash)),
            account: Some("mock-account".to_string()),
            timestamp: None,
        })
    }

    async fn verify(
        &self,
        _network: WitnessNetwork,
        _reference: &str,
        expected_commitment: &str,
        _expected_timestamp: Option<i64>,
    ) -> Result<VerificationOutcome, WitnessError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(WitnessError::Unreachable("Mock failure".to_string()));
        }

        match &self.anchored {
            Some(anchored) if anchored != expected_commitment => Ok(VerificationOutcome::Mismatch),
            _ => Ok(self.outcome.clone()),
        }
    }
}

/// Reporter that records every detail, for tests.
#[derive(Debug, Clone, Default)]
pub struct MockReporter {
    /// Details received, in order.
    pub details: Arc<Mutex<Vec<VerificationDetail>>>,
}

impl MockReporter {
    /// Verification hashes received so far.
    pub fn reported_hashes(&self) -> Vec<String> {
        self.details
            .lock()
            .map(|details| details.iter().map(|d| d.verification_hash.clone()).collect())
            .unwrap_or_default()
    }
}

impl VerificationReporter for MockReporter {
    fn report(&self, detail: &VerificationDetail) {
        if let Ok(mut details) = self.details.lock() {
            details.push(detail.clone());
        }
    }
}
