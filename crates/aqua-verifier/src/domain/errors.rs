//! # Domain Errors
//!
//! Only [`VerifierError`] ever aborts a run. Witness and signature errors are
//! converted into per-revision results before they reach the chain walk.

use thiserror::Error;

use super::value_objects::VerificationOutcome;

/// Configuration or programmer errors that abort a whole verification run.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// A revision names a witness network no backend understands.
    #[error("Unknown witness network: {0}")]
    UnknownWitnessNetwork(String),

    /// A backend is needed for a network but none was registered.
    #[error("No witness backend configured for {0}")]
    BackendNotConfigured(String),

    /// The walk was cancelled between revisions.
    #[error("Verification cancelled after {verified} revision(s)")]
    Cancelled {
        /// Revisions verified before cancellation.
        verified: usize,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failures while talking to an external witness network.
#[derive(Debug, Error)]
pub enum WitnessError {
    /// The network could not be reached.
    #[error("Server is unreachable: {0}")]
    Unreachable(String),

    /// The external reference does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote side answered with an error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The remote side answered with something unparseable.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Confirmation did not arrive within the configured bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Anchoring needs a key that was not configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Building or signing the anchoring payload failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl WitnessError {
    /// Classify into a verification outcome.
    pub fn into_outcome(self) -> VerificationOutcome {
        match self {
            WitnessError::Unreachable(_) | WitnessError::Timeout(_) => {
                VerificationOutcome::Unreachable
            }
            WitnessError::NotFound(_) => VerificationOutcome::NotFound,
            other => VerificationOutcome::LookupFailed(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for WitnessError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            WitnessError::Unreachable(e.to_string())
        } else if e.is_decode() {
            WitnessError::Protocol(e.to_string())
        } else {
            WitnessError::Rpc(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WitnessError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::Io(_) | WsError::ConnectionClosed | WsError::AlreadyClosed => {
                WitnessError::Unreachable(e.to_string())
            }
            other => WitnessError::Protocol(other.to_string()),
        }
    }
}

/// Errors raised while checking a revision signature.
///
/// These never propagate: the verifier turns every one into `INVALID`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Signature bytes are not a valid encoding.
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Invalid recovery ID (v must be 0, 1, 27, or 28)
    #[error("Invalid recovery ID: {0}")]
    InvalidRecoveryId(u8),

    /// Failed to recover public key from signature
    #[error("Failed to recover public key")]
    RecoveryFailed,

    /// Recovered signer does not match the declared one.
    #[error("Signer mismatch: expected {expected}, got {actual}")]
    SignerMismatch {
        /// Declared signer.
        expected: String,
        /// Recovered signer.
        actual: String,
    },

    /// The `did:key` identifier cannot be decoded.
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    /// The signed token is malformed or signs something else.
    #[error("Invalid signed token: {0}")]
    InvalidToken(String),

    /// Cryptographic verification failed.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// The declared signature hash does not cover the signature.
    #[error("Signature hash mismatch")]
    SignatureHashMismatch,

    /// The declared signature type is not supported.
    #[error("Unsupported signature type: {0}")]
    UnsupportedScheme(String),
}
