//! # Aqua Revision Verifier
//!
//! Verifies hash-linked revision chains: content and metadata hashes,
//! signatures over the predecessor, and witness anchoring on external networks.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every revision commits to its predecessor's verification hash. Walking a
//! chain from genesis and recomputing each revision's hashes proves the
//! history was not rewritten. Signatures bind an identity to a point in the
//! history; witnesses anchor it on a public network.
//!
//! ## Attestations
//!
//! | Kind | Scheme | Checked against |
//! |------|--------|-----------------|
//! | Signature | wallet-key (EIP-191 secp256k1) | recovered signer address |
//! | Signature | DID-key (Ed25519 JWS) | `did:key` public key |
//! | Witness | on-chain | anchoring transaction input |
//! | Witness | relay | relay event content |
//! | Witness | timestamp authority | RFC 3161 token imprint |
//!
//! ## Module Structure
//!
//! ```text
//! aqua-verifier/
//! ├── domain/          # Statuses, per-revision details, chain result, errors
//! ├── algorithms/      # Hash model, Merkle proofs, signature verification
//! ├── ports/           # API trait (inbound) + witness backend/reporter (outbound)
//! ├── adapters/        # On-chain, relay and timestamp-authority backends
//! ├── application/     # RevisionVerifier, ChainWalk, VerificationService
//! └── config.rs        # VerifierConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{EthereumWitness, NostrWitness, TsaWitness};
pub use algorithms::{
    canonical_message, content_hash, digest, digest_bytes, metadata_hash, signature_hash,
    verification_hash, verify_merkle_integrity, witness_event_hash, SignatureVerifier,
};
pub use application::{ChainWalk, RevisionVerifier, VerificationService, WitnessBackends};
pub use config::{EthereumConfig, NostrConfig, TsaConfig, VerifierConfig};
pub use domain::{
    AttestationStatus, BackendKind, ChainStatus, ChainVerification, CheckStatus, EthNetwork,
    MerkleProofStatus, RevisionFailure, RevisionStatus, SignatureError, SignatureScheme,
    VerificationDetail, VerificationOutcome, VerifierError, WalkOptions, WitnessError,
    WitnessNetwork, WitnessReceipt, WitnessReport,
};
pub use ports::{
    MockReporter, MockWitnessBackend, NullReporter, RevisionVerificationApi,
    VerificationReporter, WitnessBackend,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
