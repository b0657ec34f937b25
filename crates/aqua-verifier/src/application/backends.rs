//! # Witness Backend Registry
//!
//! Holds at most one backend per [`BackendKind`]. A revision whose network
//! needs a kind that was never registered aborts the run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::adapters::{EthereumWitness, NostrWitness, TsaWitness};
use crate::config::VerifierConfig;
use crate::domain::{BackendKind, VerifierError};
use crate::ports::WitnessBackend;

/// Registered witness backends, keyed by kind.
#[derive(Clone, Default)]
pub struct WitnessBackends {
    backends: HashMap<BackendKind, Arc<dyn WitnessBackend>>,
}

impl WitnessBackends {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the three network adapters from configuration.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, VerifierError> {
        let ethereum = EthereumWitness::new(config.ethereum.clone())
            .map_err(|e| VerifierError::Config(e.to_string()))?;
        let tsa =
            TsaWitness::new(config.tsa.clone()).map_err(|e| VerifierError::Config(e.to_string()))?;

        Ok(Self::new()
            .with(Arc::new(ethereum))
            .with(Arc::new(NostrWitness::new(config.nostr.clone())))
            .with(Arc::new(tsa)))
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, backend: Arc<dyn WitnessBackend>) -> Self {
        self.register(backend);
        self
    }

    /// Register `backend` under its kind, returning the one it replaces.
    pub fn register(&mut self, backend: Arc<dyn WitnessBackend>) -> Option<Arc<dyn WitnessBackend>> {
        self.backends.insert(backend.kind(), backend)
    }

    /// Backend serving `kind`.
    pub fn get(&self, kind: BackendKind) -> Result<&Arc<dyn WitnessBackend>, VerifierError> {
        self.backends
            .get(&kind)
            .ok_or_else(|| VerifierError::BackendNotConfigured(kind.to_string()))
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for WitnessBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.backends.keys()).finish()
    }
}
