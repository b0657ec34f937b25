//! # Value Objects
//!
//! Witness network selection, backend outcomes and signature schemes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::VerifierError;

/// Ethereum networks a witness transaction can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EthNetwork {
    /// Ethereum mainnet.
    Mainnet,
    /// Sepolia testnet.
    Sepolia,
    /// Holesky testnet.
    Holesky,
}

impl EthNetwork {
    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            EthNetwork::Mainnet => 1,
            EthNetwork::Sepolia => 11_155_111,
            EthNetwork::Holesky => 17_000,
        }
    }

    /// Tag as written in `witness_network`.
    pub fn tag(&self) -> &'static str {
        match self {
            EthNetwork::Mainnet => "mainnet",
            EthNetwork::Sepolia => "sepolia",
            EthNetwork::Holesky => "holesky",
        }
    }
}

/// The closed set of backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Blockchain transaction call data.
    OnChain,
    /// Event published on a relay network.
    Relay,
    /// RFC 3161 timestamp token.
    TimestampAuthority,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::OnChain => f.write_str("on-chain"),
            BackendKind::Relay => f.write_str("relay"),
            BackendKind::TimestampAuthority => f.write_str("timestamp-authority"),
        }
    }
}

/// Backend selected by a revision's `witness_network` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WitnessNetwork {
    /// On-chain witness on the given network.
    OnChain(EthNetwork),
    /// Nostr relay event.
    Relay,
    /// Trusted timestamp authority.
    TimestampAuthority,
}

impl WitnessNetwork {
    /// Tag used for relay witnesses.
    pub const RELAY_TAG: &'static str = "nostr";
    /// Tag used for timestamp-authority witnesses.
    pub const TSA_TAG: &'static str = "TSA_RFC3161";

    /// Resolve a `witness_network` tag. Unknown tags abort the run.
    pub fn parse(tag: &str) -> Result<Self, VerifierError> {
        match tag {
            "mainnet" => Ok(Self::OnChain(EthNetwork::Mainnet)),
            "sepolia" => Ok(Self::OnChain(EthNetwork::Sepolia)),
            "holesky" => Ok(Self::OnChain(EthNetwork::Holesky)),
            Self::RELAY_TAG => Ok(Self::Relay),
            Self::TSA_TAG => Ok(Self::TimestampAuthority),
            other => Err(VerifierError::UnknownWitnessNetwork(other.to_string())),
        }
    }

    /// Backend kind that serves this network.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::OnChain(_) => BackendKind::OnChain,
            Self::Relay => BackendKind::Relay,
            Self::TimestampAuthority => BackendKind::TimestampAuthority,
        }
    }

    /// Tag as written in `witness_network`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::OnChain(network) => network.tag(),
            Self::Relay => Self::RELAY_TAG,
            Self::TimestampAuthority => Self::TSA_TAG,
        }
    }
}

impl fmt::Display for WitnessNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of checking an external reference against an expected commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    /// The anchored commitment equals the expected one.
    Match,
    /// The reference exists but anchors something else.
    Mismatch,
    /// The reference does not exist.
    NotFound,
    /// The backend could not be reached.
    Unreachable,
    /// Any other lookup failure.
    LookupFailed(String),
}

impl VerificationOutcome {
    /// Whether the lookup confirmed the commitment.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Human readable reason attached to the witness report.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Match | Self::Mismatch => None,
            Self::NotFound => Some("Transaction hash not found"),
            Self::Unreachable => Some("Server is unreachable"),
            Self::LookupFailed(_) => Some("Online lookup failed"),
        }
    }
}

/// What a backend hands back after anchoring a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessReceipt {
    /// Transaction hash, relay event id or encoded timestamp token.
    pub reference: String,
    /// Sender account or public key used to anchor.
    pub account: Option<String>,
    /// Anchoring time in unix seconds, when the backend reports one.
    pub timestamp: Option<i64>,
}

/// Signature scheme of a revision signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// EIP-191 personal message signed by a secp256k1 wallet key.
    EthereumWallet,
    /// Compact JWS signed by an Ed25519 `did:key`.
    DidKey,
}

impl SignatureScheme {
    /// Explicit tag for wallet signatures.
    pub const ETHEREUM_TAG: &'static str = "ethereum:eip-191";
    /// Explicit tag for DID signatures.
    pub const DID_TAG: &'static str = "did:key";

    /// Pick the scheme from an explicit tag, falling back to the key format.
    pub fn detect(signature_type: Option<&str>, public_key: &str) -> Option<Self> {
        match signature_type {
            Some(Self::ETHEREUM_TAG) => Some(Self::EthereumWallet),
            Some(Self::DID_TAG) => Some(Self::DidKey),
            Some(_) => None,
            None if public_key.starts_with("did:key:") => Some(Self::DidKey),
            None => Some(Self::EthereumWallet),
        }
    }
}

/// Per-run options threaded through the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkOptions {
    /// Check `structured_merkle_proof` of witness revisions.
    pub verify_merkle_proof: bool,
    /// Emit per-check diagnostics.
    pub verbose: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            verify_merkle_proof: true,
            verbose: false,
        }
    }
}
