//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod backends;
pub mod chain_walker;
pub mod revision_verifier;
pub mod service;

pub use backends::WitnessBackends;
pub use chain_walker::ChainWalk;
pub use revision_verifier::RevisionVerifier;
pub use service::VerificationService;
