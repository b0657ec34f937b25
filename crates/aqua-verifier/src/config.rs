//! # Verifier Configuration
//!
//! Endpoints, pacing and credentials for the witness backends, plus walk
//! defaults. Loadable from TOML (see the CLI) and overridable from the
//! environment.

use serde::{Deserialize, Serialize};

use crate::domain::{EthNetwork, VerifierError, WalkOptions};

/// Default relay for relay witnesses.
pub const DEFAULT_NOSTR_RELAY: &str = "wss://relay.damus.io";

/// Default RFC 3161 timestamp authority.
pub const DEFAULT_TSA_URL: &str = "http://timestamp.digicert.com";

/// Function selector of the witness contract's anchoring call.
pub const WITNESS_SELECTOR: &str = "0x9cef4ea1";

/// Full verifier configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// On-chain backend.
    pub ethereum: EthereumConfig,
    /// Relay backend.
    pub nostr: NostrConfig,
    /// Timestamp-authority backend.
    pub tsa: TsaConfig,
    /// Walk defaults.
    pub walk: WalkOptions,
}

/// On-chain backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint for mainnet.
    pub mainnet_rpc: String,
    /// JSON-RPC endpoint for Sepolia.
    pub sepolia_rpc: String,
    /// JSON-RPC endpoint for Holesky.
    pub holesky_rpc: String,
    /// Witness contract address.
    pub contract_address: String,
    /// Function selector prefixing the call data.
    pub selector: String,
    /// Pause after each lookup, in milliseconds.
    pub lookup_delay_ms: u64,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Delay before the second receipt poll, in milliseconds.
    pub receipt_poll_interval_ms: u64,
    /// Factor applied to the poll delay after each empty poll.
    pub receipt_poll_backoff: u32,
    /// Upper bound on the poll delay, in milliseconds.
    pub max_receipt_poll_interval_ms: u64,
    /// Receipt polls before giving up.
    pub max_receipt_polls: u32,
    /// Gas limit of the anchoring transaction.
    pub gas_limit: u64,
    /// Hex secp256k1 key used to anchor. Only needed for `witness`.
    #[serde(skip_serializing)]
    pub signing_key: Option<String>,
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            mainnet_rpc: "https://eth.llamarpc.com".to_string(),
            sepolia_rpc: "https://rpc.sepolia.org".to_string(),
            holesky_rpc: "https://ethereum-holesky-rpc.publicnode.com".to_string(),
            contract_address: "0x45f59310ADD88E6d23ca58A0Fa7A55BEE6d2a611".to_string(),
            selector: WITNESS_SELECTOR.to_string(),
            lookup_delay_ms: 1_000,
            request_timeout_secs: 10,
            receipt_poll_interval_ms: 3_000,
            receipt_poll_backoff: 2,
            max_receipt_poll_interval_ms: 30_000,
            max_receipt_polls: 40,
            gas_limit: 100_000,
            signing_key: None,
        }
    }
}

impl EthereumConfig {
    /// RPC endpoint for `network`.
    pub fn rpc_url(&self, network: EthNetwork) -> &str {
        match network {
            EthNetwork::Mainnet => &self.mainnet_rpc,
            EthNetwork::Sepolia => &self.sepolia_rpc,
            EthNetwork::Holesky => &self.holesky_rpc,
        }
    }
}

/// Relay backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NostrConfig {
    /// Relay websocket URL.
    pub relay_url: String,
    /// Bound on waiting for relay confirmation, in milliseconds.
    pub confirm_timeout_ms: u64,
    /// Hex BIP-340 secret key used to publish. Only needed for `witness`.
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl Default for NostrConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_NOSTR_RELAY.to_string(),
            confirm_timeout_ms: 10_000,
            secret_key: None,
        }
    }
}

/// Timestamp-authority backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TsaConfig {
    /// Authority URL.
    pub url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TsaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TSA_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl VerifierConfig {
    /// Create a config for testing (no pacing, short bounds).
    pub fn for_testing() -> Self {
        Self {
            ethereum: EthereumConfig {
                lookup_delay_ms: 0,
                request_timeout_secs: 1,
                receipt_poll_interval_ms: 10,
                max_receipt_poll_interval_ms: 40,
                max_receipt_polls: 3,
                ..Default::default()
            },
            nostr: NostrConfig {
                confirm_timeout_ms: 500,
                ..Default::default()
            },
            tsa: TsaConfig {
                request_timeout_secs: 1,
                ..Default::default()
            },
            walk: WalkOptions::default(),
        }
    }

    /// Apply `AQUA_*` environment overrides.
    pub fn with_env(self) -> Result<Self, VerifierError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, VerifierError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AQUA_ETH_MAINNET_RPC") {
            self.ethereum.mainnet_rpc = url;
        }
        if let Some(url) = lookup("AQUA_ETH_SEPOLIA_RPC") {
            self.ethereum.sepolia_rpc = url;
        }
        if let Some(url) = lookup("AQUA_ETH_HOLESKY_RPC") {
            self.ethereum.holesky_rpc = url;
        }
        if let Some(url) = lookup("AQUA_NOSTR_RELAY") {
            self.nostr.relay_url = url;
        }
        if let Some(url) = lookup("AQUA_TSA_URL") {
            self.tsa.url = url;
        }
        if let Some(delay) = lookup("AQUA_LOOKUP_DELAY_MS") {
            self.ethereum.lookup_delay_ms = delay.parse().map_err(|_| {
                VerifierError::Config(format!("AQUA_LOOKUP_DELAY_MS is not a number: {delay}"))
            })?;
        }
        if let Some(key) = lookup("AQUA_ETH_SIGNING_KEY") {
            self.ethereum.signing_key = Some(key);
        }
        if let Some(key) = lookup("AQUA_NOSTR_SECRET_KEY") {
            self.nostr.secret_key = Some(key);
        }
        Ok(self)
    }
}
