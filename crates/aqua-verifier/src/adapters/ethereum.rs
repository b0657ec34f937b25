//! # On-Chain Witness Adapter
//!
//! Ethereum JSON-RPC backend. A witness is a transaction to the witness
//! contract whose call data is `selector ‖ commitment`.
//!
//! ## Verify
//!
//! `eth_getTransactionByHash`, then compare the 64 bytes after the selector to
//! the expected commitment. A `null` transaction is `NotFound`. Every lookup is
//! followed by the configured pacing delay, whatever its result.
//!
//! ## Witness
//!
//! Sign an EIP-155 legacy transaction locally, send it raw and poll for the
//! receipt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::signature::{address_from_pubkey, keccak256};
use crate::config::EthereumConfig;
use crate::domain::{
    BackendKind, EthNetwork, VerificationOutcome, WitnessError, WitnessNetwork, WitnessReceipt,
};
use crate::ports::WitnessBackend;

/// Hex length of the anchored commitment (64 bytes).
const COMMITMENT_HEX_LEN: usize = 128;

// =============================================================================
// JSON-RPC TYPES
// =============================================================================

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: String,
    params: T,
    id: u64,
}

impl<T> JsonRpcRequest<T> {
    fn new(method: impl Into<String>, params: T, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

/// The fields of a transaction the verifier reads.
#[derive(Debug, Deserialize)]
struct RpcTransaction {
    input: String,
}

/// The fields of a receipt the verifier reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Ethereum witness backend.
pub struct EthereumWitness {
    client: Client,
    config: EthereumConfig,
    request_id: AtomicU64,
}

impl EthereumWitness {
    /// Create a backend from configuration.
    pub fn new(config: EthereumConfig) -> Result<Self, WitnessError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WitnessError::Rpc(e.to_string()))?;

        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(1),
        })
    }

    /// Get the next request ID.
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC method. A `null` result is `Ok(None)`.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        network: EthNetwork,
        method: &str,
        params: P,
    ) -> Result<Option<R>, WitnessError> {
        let url = self.config.rpc_url(network);
        let request = JsonRpcRequest::new(method, params, self.next_id());
        debug!(method, %url, "[aqua] JSON-RPC call");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let rpc_response: JsonRpcResponse<R> = response.json().await?;
        if let Some(error) = rpc_response.error {
            return Err(WitnessError::Rpc(error.to_string()));
        }

        Ok(rpc_response.result)
    }

    async fn lookup(
        &self,
        network: EthNetwork,
        tx_hash: &str,
        expected_commitment: &str,
    ) -> Result<VerificationOutcome, WitnessError> {
        let tx: Option<RpcTransaction> = self
            .call(network, "eth_getTransactionByHash", [with_hex_prefix(tx_hash)])
            .await?;

        let Some(tx) = tx else {
            return Ok(VerificationOutcome::NotFound);
        };

        match extract_commitment(&tx.input, &self.config.selector) {
            Some(anchored) if anchored == expected_commitment.to_lowercase() => {
                Ok(VerificationOutcome::Match)
            }
            Some(_) => Ok(VerificationOutcome::Mismatch),
            None => {
                debug!(tx = %tx_hash, "[aqua] Transaction input is not a witness call");
                Ok(VerificationOutcome::Mismatch)
            }
        }
    }

    async fn quantity(
        &self,
        network: EthNetwork,
        method: &str,
        params: serde_json::Value,
    ) -> Result<u128, WitnessError> {
        let value: Option<String> = self.call(network, method, params).await?;
        let value = value.ok_or_else(|| WitnessError::Protocol(format!("{method} returned null")))?;
        parse_quantity(&value)
    }

    async fn await_receipt(&self, network: EthNetwork, tx_hash: &str) -> Result<(), WitnessError> {
        let max_polls = self.config.max_receipt_polls;
        for (attempt, delay) in (1..=max_polls).zip(receipt_poll_delays(&self.config)) {
            let receipt: Option<RpcReceipt> = self
                .call(network, "eth_getTransactionReceipt", [tx_hash])
                .await?;

            if let Some(receipt) = receipt {
                if receipt.status.as_deref() == Some("0x0") {
                    return Err(WitnessError::Rpc(format!("Transaction {tx_hash} reverted")));
                }
                debug!(
                    tx = %tx_hash,
                    block = ?receipt.block_number,
                    attempt,
                    "[aqua] Witness transaction mined"
                );
                return Ok(());
            }

            if attempt < max_polls {
                debug!(tx = %tx_hash, attempt, delay_ms = delay.as_millis() as u64, "[aqua] No receipt yet");
                tokio::time::sleep(delay).await;
            }
        }

        Err(WitnessError::Timeout(format!(
            "No receipt for {tx_hash} after {} polls",
            self.config.max_receipt_polls
        )))
    }
}

/// Delays between receipt polls: starts at the poll interval and grows by the
/// backoff factor up to the configured cap.
pub fn receipt_poll_delays(config: &EthereumConfig) -> impl Iterator<Item = Duration> {
    let factor = u64::from(config.receipt_poll_backoff.max(1));
    let cap = config.max_receipt_poll_interval_ms;
    std::iter::successors(Some(config.receipt_poll_interval_ms.min(cap)), move |ms| {
        Some(ms.saturating_mul(factor).min(cap))
    })
    .map(Duration::from_millis)
}

#[async_trait]
impl WitnessBackend for EthereumWitness {
    fn kind(&self) -> BackendKind {
        BackendKind::OnChain
    }

    async fn witness(
        &self,
        network: WitnessNetwork,
        event_hash: &str,
    ) -> Result<WitnessReceipt, WitnessError> {
        let WitnessNetwork::OnChain(eth) = network else {
            return Err(WitnessError::Protocol(format!("{network} is not an on-chain network")));
        };

        let key_hex = self
            .config
            .signing_key
            .as_deref()
            .ok_or_else(|| WitnessError::MissingCredentials("ethereum.signing_key".into()))?;
        let key = parse_signing_key(key_hex)?;
        let from = address_from_pubkey(key.verifying_key());

        let nonce = self
            .quantity(eth, "eth_getTransactionCount", serde_json::json!([from, "pending"]))
            .await?;
        let gas_price = self.quantity(eth, "eth_gasPrice", serde_json::json!([])).await?;

        let tx = LegacyTransaction {
            nonce: u64::try_from(nonce).map_err(|_| WitnessError::Protocol("nonce overflow".into()))?,
            gas_price,
            gas_limit: self.config.gas_limit,
            to: decode_hex(&self.config.contract_address)?,
            data: witness_call_data(&self.config.selector, event_hash)?,
            chain_id: eth.chain_id(),
        };
        let (raw, local_hash) = tx.sign(&key)?;

        let sent: Option<String> = self
            .call(eth, "eth_sendRawTransaction", [format!("0x{}", hex::encode(raw))])
            .await?;
        let tx_hash = sent.unwrap_or(local_hash);
        info!(tx = %tx_hash, network = %eth.tag(), "[aqua] Witness transaction sent");

        self.await_receipt(eth, &tx_hash).await?;

        Ok(WitnessReceipt {
            reference: tx_hash,
            account: Some(from),
            timestamp: Some(chrono::Utc::now().timestamp()),
        })
    }

    async fn verify(
        &self,
        network: WitnessNetwork,
        reference: &str,
        expected_commitment: &str,
        _expected_timestamp: Option<i64>,
    ) -> Result<VerificationOutcome, WitnessError> {
        let WitnessNetwork::OnChain(eth) = network else {
            return Err(WitnessError::Protocol(format!("{network} is not an on-chain network")));
        };

        let result = self.lookup(eth, reference, expected_commitment).await;
        if let Err(e) = &result {
            warn!(tx = %reference, error = %e, "[aqua] On-chain lookup failed");
        }

        // Pace consecutive lookups against public endpoints.
        tokio::time::sleep(Duration::from_millis(self.config.lookup_delay_ms)).await;
        result
    }
}

// =============================================================================
// TRANSACTION ENCODING
// =============================================================================

/// Unsigned EIP-155 legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender nonce.
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    /// Gas limit.
    pub gas_limit: u64,
    /// Recipient address bytes.
    pub to: Vec<u8>,
    /// Call data.
    pub data: Vec<u8>,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

impl LegacyTransaction {
    /// Keccak-256 signing hash over `rlp([nonce, gasPrice, gas, to, 0, data, chainId, 0, 0])`.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = rlp::RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak256(stream.as_raw())
    }

    /// Sign and return the raw encoding plus its transaction hash.
    pub fn sign(&self, key: &SigningKey) -> Result<(Vec<u8>, String), WitnessError> {
        let (sig, recid) = key
            .sign_prehash_recoverable(&self.signing_hash())
            .map_err(|e| WitnessError::Signing(e.to_string()))?;
        let sig_bytes = sig.to_bytes();
        let v = u64::from(recid.to_byte()) + self.chain_id * 2 + 35;

        let mut stream = rlp::RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&sig_bytes[..32]));
        stream.append(&trim_leading_zeros(&sig_bytes[32..]));
        let raw = stream.out().to_vec();
        let hash = format!("0x{}", hex::encode(keccak256(&raw)));
        Ok((raw, hash))
    }

    fn append_fields(&self, stream: &mut rlp::RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&0u8);
        stream.append(&self.data);
    }
}

/// Extract the lowercase hex commitment behind `selector` in call data.
pub fn extract_commitment(input: &str, selector: &str) -> Option<String> {
    let input = input.trim_start_matches("0x").to_lowercase();
    let selector = selector.trim_start_matches("0x").to_lowercase();
    let payload = input.strip_prefix(&selector)?;
    payload.get(..COMMITMENT_HEX_LEN).map(str::to_string)
}

/// Call data anchoring `event_hash`.
pub fn witness_call_data(selector: &str, event_hash: &str) -> Result<Vec<u8>, WitnessError> {
    let mut data = decode_hex(selector)?;
    let commitment = decode_hex(event_hash)?;
    if commitment.len() != COMMITMENT_HEX_LEN / 2 {
        return Err(WitnessError::Signing(format!(
            "Commitment must be 64 bytes, got {}",
            commitment.len()
        )));
    }
    data.extend_from_slice(&commitment);
    Ok(data)
}

/// Parse a hex JSON-RPC quantity.
pub fn parse_quantity(value: &str) -> Result<u128, WitnessError> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| WitnessError::Protocol(format!("Invalid quantity: {value}")))
}

fn parse_signing_key(key_hex: &str) -> Result<SigningKey, WitnessError> {
    let bytes = decode_hex(key_hex)?;
    SigningKey::from_slice(&bytes).map_err(|e| WitnessError::Signing(e.to_string()))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, WitnessError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| WitnessError::Signing(format!("Invalid hex: {e}")))
}

fn with_hex_prefix(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::digest;
    use crate::config::VerifierConfig;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    fn commitment() -> String {
        digest("genesis-and-root")
    }

    #[test]
    fn test_extract_commitment() {
        let input = format!("0x9cef4ea1{}", commitment().to_uppercase());
        assert_eq!(extract_commitment(&input, "0x9cef4ea1"), Some(commitment()));
    }

    #[test]
    fn test_extract_commitment_wrong_selector() {
        let input = format!("0xdeadbeef{}", commitment());
        assert_eq!(extract_commitment(&input, "0x9cef4ea1"), None);
    }

    #[test]
    fn test_extract_commitment_short_input() {
        assert_eq!(extract_commitment("0x9cef4ea1abcd", "0x9cef4ea1"), None);
    }

    #[test]
    fn test_witness_call_data() {
        let data = witness_call_data("0x9cef4ea1", &commitment()).unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &[0x9c, 0xef, 0x4e, 0xa1]);
        assert!(witness_call_data("0x9cef4ea1", "abcd").is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_signed_transaction_recovers_sender() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let tx = LegacyTransaction {
            nonce: 7,
            gas_price: 1_000_000_000,
            gas_limit: 100_000,
            to: vec![0x11; 20],
            data: witness_call_data("0x9cef4ea1", &commitment()).unwrap(),
            chain_id: EthNetwork::Sepolia.chain_id(),
        };
        let (raw, hash) = tx.sign(&key).unwrap();
        assert_eq!(hash, format!("0x{}", hex::encode(keccak256(&raw))));

        let rlp = rlp::Rlp::new(&raw);
        assert_eq!(rlp.item_count().unwrap(), 9);
        let nonce: u64 = rlp.val_at(0).unwrap();
        assert_eq!(nonce, 7);

        let v: u64 = rlp.val_at(6).unwrap();
        let r: Vec<u8> = rlp.val_at(7).unwrap();
        let s: Vec<u8> = rlp.val_at(8).unwrap();
        let mut sig_bytes = [0u8; 64];
        sig_bytes[32 - r.len()..32].copy_from_slice(&r);
        sig_bytes[64 - s.len()..].copy_from_slice(&s);
        let sig = Signature::from_slice(&sig_bytes).unwrap();
        let recid = RecoveryId::try_from((v - 35 - tx.chain_id * 2) as u8).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&tx.signing_hash(), &sig, recid).unwrap();
        assert_eq!(&recovered, key.verifying_key());
    }

    #[test]
    fn test_receipt_poll_delays_back_off_to_cap() {
        let config = EthereumConfig {
            receipt_poll_interval_ms: 10,
            receipt_poll_backoff: 2,
            max_receipt_poll_interval_ms: 50,
            ..Default::default()
        };
        let delays: Vec<u64> = receipt_poll_delays(&config)
            .take(5)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![10, 20, 40, 50, 50]);
    }

    #[test]
    fn test_receipt_poll_delays_without_backoff() {
        let config = EthereumConfig {
            receipt_poll_interval_ms: 3_000,
            receipt_poll_backoff: 0,
            ..Default::default()
        };
        let delays: Vec<u64> = receipt_poll_delays(&config)
            .take(3)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 3_000, 3_000]);
    }

    #[test]
    fn test_default_receipt_poll_delays() {
        let delays: Vec<u64> = receipt_poll_delays(&EthereumConfig::default())
            .take(6)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 6_000, 12_000, 24_000, 30_000, 30_000]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let mut config = VerifierConfig::for_testing().ethereum;
        config.sepolia_rpc = "http://127.0.0.1:9".to_string();
        let backend = EthereumWitness::new(config).unwrap();
        let err = backend
            .verify(
                WitnessNetwork::OnChain(EthNetwork::Sepolia),
                "0xabc",
                &commitment(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WitnessError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_witness_without_key() {
        let backend = EthereumWitness::new(VerifierConfig::for_testing().ethereum).unwrap();
        let err = backend
            .witness(WitnessNetwork::OnChain(EthNetwork::Sepolia), &commitment())
            .await
            .unwrap_err();
        assert!(matches!(err, WitnessError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_chain_network() {
        let backend = EthereumWitness::new(VerifierConfig::for_testing().ethereum).unwrap();
        assert!(backend
            .verify(WitnessNetwork::Relay, "id", &commitment(), None)
            .await
            .is_err());
    }
}
