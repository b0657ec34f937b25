//! # Algorithms
//!
//! Pure verification logic: the hash model, Merkle proofs and signatures.

pub mod hashing;
pub mod merkle_verifier;
pub mod signature;

pub use hashing::{
    content_hash, digest, digest_bytes, metadata_hash, signature_hash, verification_hash,
    witness_event_hash,
};
pub use merkle_verifier::verify_merkle_integrity;
pub use signature::{canonical_message, SignatureVerifier};
