//! # Signature Verification
//!
//! Checks a revision signature over the canonical page message.
//!
//! ## Schemes
//!
//! - **Wallet key**: EIP-191 personal message, secp256k1 public key recovery,
//!   signer compared to `wallet_address` case-insensitively.
//! - **DID key**: compact JWS (`EdDSA`) over the canonical message, attached or
//!   detached (empty payload segment), verified with the Ed25519 key embedded in a `did:key` identifier.
//!
//! Every failure is a [`SignatureError`]. The caller turns it into `INVALID`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519Key};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use shared_types::RevisionSignature;
use tracing::debug;

use super::hashing::signature_hash;
use crate::domain::{SignatureError, SignatureScheme};

/// Multicodec prefix of an Ed25519 public key.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Prefix of a base58btc `did:key` identifier.
const DID_KEY_PREFIX: &str = "did:key:z";

// =============================================================================
// SIGNATURE VERIFIER
// =============================================================================

/// Stateless signature verifier.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new verifier.
    pub fn new() -> Self {
        Self
    }

    /// Verify `signature` as an attestation of `target_hash`.
    ///
    /// Checks the declared `signature_hash` first, then dispatches on the scheme.
    pub fn verify(
        &self,
        signature: &RevisionSignature,
        target_hash: &str,
    ) -> Result<(), SignatureError> {
        if signature_hash(&signature.signature, &signature.public_key) != signature.signature_hash
        {
            return Err(SignatureError::SignatureHashMismatch);
        }

        let scheme =
            SignatureScheme::detect(signature.signature_type.as_deref(), &signature.public_key)
                .ok_or_else(|| {
                    SignatureError::UnsupportedScheme(
                        signature.signature_type.clone().unwrap_or_default(),
                    )
                })?;

        let message = canonical_message(target_hash);
        match scheme {
            SignatureScheme::EthereumWallet => {
                verify_wallet_signature(&message, &signature.signature, &signature.wallet_address)
            }
            SignatureScheme::DidKey => verify_did_signature(
                &message,
                &signature.signature,
                &signature.public_key,
                &signature.wallet_address,
            ),
        }
    }
}

/// The message a signer attests for `verification_hash`.
pub fn canonical_message(verification_hash: &str) -> String {
    format!("I sign the following page verification_hash: [0x{verification_hash}]")
}

// =============================================================================
// WALLET KEY (secp256k1)
// =============================================================================

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 personal message hash.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// Derive the `0x`-prefixed lowercase address of a public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> String {
    let encoded = public_key.to_encoded_point(false);
    // Skip the 0x04 prefix of the uncompressed point.
    let hash = keccak256(&encoded.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the signer address of a 65-byte `r ‖ s ‖ v` signature.
pub fn recover_address(message: &str, signature_hex: &str) -> Result<String, SignatureError> {
    let bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| SignatureError::InvalidFormat)?;
    if bytes.len() != 65 {
        return Err(SignatureError::InvalidFormat);
    }

    let mut recovery_id = parse_recovery_id(bytes[64])?;
    let mut sig = Signature::from_slice(&bytes[..64]).map_err(|_| SignatureError::InvalidFormat)?;

    // Wallets emit low-S signatures, but normalize anyway so recovery accepts them.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let prehash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_from_pubkey(&key))
}

/// Verify a wallet signature against the declared address.
pub fn verify_wallet_signature(
    message: &str,
    signature_hex: &str,
    wallet_address: &str,
) -> Result<(), SignatureError> {
    let recovered = recover_address(message, signature_hex)?;
    let expected = wallet_address.to_lowercase();
    if recovered != expected {
        debug!(%expected, %recovered, "[aqua] Wallet signer mismatch");
        return Err(SignatureError::SignerMismatch {
            expected,
            actual: recovered,
        });
    }
    Ok(())
}

/// Parse recovery ID from v value.
///
/// Valid v values: 0, 1, 27, 28
fn parse_recovery_id(v: u8) -> Result<RecoveryId, SignatureError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(SignatureError::InvalidRecoveryId(v)),
    };

    RecoveryId::try_from(id).map_err(|_| SignatureError::InvalidRecoveryId(v))
}

// =============================================================================
// DID KEY (Ed25519)
// =============================================================================

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Decode the Ed25519 key embedded in a `did:key` identifier.
pub fn did_key_to_verifying_key(did: &str) -> Result<Ed25519Key, SignatureError> {
    let encoded = did
        .strip_prefix(DID_KEY_PREFIX)
        .ok_or_else(|| SignatureError::InvalidDid(did.to_string()))?;
    // Drop any `#fragment` key reference.
    let encoded = encoded.split('#').next().unwrap_or(encoded);

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| SignatureError::InvalidDid(e.to_string()))?;

    let key_bytes: [u8; 32] = bytes
        .strip_prefix(&ED25519_MULTICODEC)
        .and_then(|rest| rest.try_into().ok())
        .ok_or_else(|| SignatureError::InvalidDid("not an Ed25519 did:key".to_string()))?;

    Ed25519Key::from_bytes(&key_bytes).map_err(|e| SignatureError::InvalidDid(e.to_string()))
}

/// Verify a compact JWS signed by `did` over `message`.
///
/// Both the attached form and the detached form with an empty payload
/// segment are accepted. The declared signer must be the same `did`, and a `kid` in the header, if
/// present, must reference it.
pub fn verify_did_signature(
    message: &str,
    token: &str,
    did: &str,
    declared_signer: &str,
) -> Result<(), SignatureError> {
    if declared_signer != did {
        return Err(SignatureError::SignerMismatch {
            expected: declared_signer.to_string(),
            actual: did.to_string(),
        });
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SignatureError::InvalidToken("expected three segments".into()));
    };

    let header: JwsHeader = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|raw| serde_json::from_slice(&raw).ok())
        .ok_or_else(|| SignatureError::InvalidToken("unreadable header".into()))?;
    if header.alg != "EdDSA" {
        return Err(SignatureError::InvalidToken(format!(
            "unsupported alg {}",
            header.alg
        )));
    }
    if let Some(kid) = &header.kid {
        if kid.split('#').next() != Some(did) {
            return Err(SignatureError::SignerMismatch {
                expected: did.to_string(),
                actual: kid.clone(),
            });
        }
    }

    // Detached form (`header..signature`) signs over the message itself.
    let payload_b64 = if payload_b64.is_empty() {
        URL_SAFE_NO_PAD.encode(message)
    } else {
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| SignatureError::InvalidToken(e.to_string()))?;
        if payload != message.as_bytes() {
            return Err(SignatureError::InvalidToken("payload is not the page message".into()));
        }
        payload_b64.to_string()
    };

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| SignatureError::InvalidFormat)?;
    let sig = Ed25519Signature::from_slice(&sig_bytes).map_err(|_| SignatureError::InvalidFormat)?;

    let key = did_key_to_verifying_key(did)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    key.verify_strict(signing_input.as_bytes(), &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;

    fn target() -> String {
        crate::algorithms::hashing::digest("previous revision")
    }

    #[test]
    fn test_canonical_message() {
        assert_eq!(
            canonical_message("abc"),
            "I sign the following page verification_hash: [0xabc]"
        );
    }

    #[test]
    fn test_wallet_signature_round_trip() {
        let sig = wallet_revision_signature(&target());
        assert!(SignatureVerifier::new().verify(&sig, &target()).is_ok());
    }

    #[test]
    fn test_wallet_address_compared_case_insensitively() {
        let sig = wallet_revision_signature(&target());
        assert_ne!(sig.wallet_address, sig.wallet_address.to_lowercase());
        assert!(verify_wallet_signature(
            &canonical_message(&target()),
            &sig.signature,
            &sig.wallet_address
        )
        .is_ok());
    }

    #[test]
    fn test_wallet_signature_wrong_target() {
        let sig = wallet_revision_signature(&target());
        let err = SignatureVerifier::new()
            .verify(&sig, &crate::algorithms::hashing::digest("other"))
            .unwrap_err();
        assert!(matches!(err, SignatureError::SignerMismatch { .. }));
    }

    #[test]
    fn test_wallet_signature_accepts_raw_recovery_ids() {
        let key = wallet_key();
        let message = canonical_message(&target());
        let sig = sign_wallet(&key, &message);
        let mut bytes = hex::decode(sig.trim_start_matches("0x")).unwrap();
        bytes[64] -= 27;
        let recovered = recover_address(&message, &hex::encode(bytes)).unwrap();
        assert_eq!(recovered, address_from_pubkey(key.verifying_key()));
    }

    #[test]
    fn test_invalid_recovery_ids() {
        let message = canonical_message(&target());
        let mut bytes = vec![0x01; 64];
        bytes.push(5);
        assert_eq!(
            recover_address(&message, &hex::encode(bytes)),
            Err(SignatureError::InvalidRecoveryId(5))
        );
    }

    #[test]
    fn test_garbage_signature_is_invalid_format() {
        assert_eq!(
            recover_address("msg", "0xnothex"),
            Err(SignatureError::InvalidFormat)
        );
        assert_eq!(
            recover_address("msg", "0xabcd"),
            Err(SignatureError::InvalidFormat)
        );
    }

    #[test]
    fn test_signature_hash_mismatch() {
        let mut sig = wallet_revision_signature(&target());
        sig.signature_hash = crate::algorithms::hashing::digest("forged");
        assert_eq!(
            SignatureVerifier::new().verify(&sig, &target()),
            Err(SignatureError::SignatureHashMismatch)
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        let mut sig = wallet_revision_signature(&target());
        sig.signature_type = Some("pgp".into());
        assert!(matches!(
            SignatureVerifier::new().verify(&sig, &target()),
            Err(SignatureError::UnsupportedScheme(tag)) if tag == "pgp"
        ));
    }

    #[test]
    fn test_did_signature_round_trip() {
        let sig = did_revision_signature(&target());
        assert!(SignatureVerifier::new().verify(&sig, &target()).is_ok());
    }

    #[test]
    fn test_did_signature_wrong_message() {
        let sig = did_revision_signature(&target());
        assert!(matches!(
            SignatureVerifier::new().verify(&sig, &crate::algorithms::hashing::digest("x")),
            Err(SignatureError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_did_signed_by_other_key() {
        let other = ed25519_dalek::SigningKey::from_bytes(&[0x33; 32]);
        let did = did_of(&did_signing_key());
        let message = canonical_message(&target());
        // Token claims the first DID but is signed by another key.
        let token = sign_jws(&other, &message);
        let err = verify_did_signature(&message, &token, &did, &did).unwrap_err();
        assert!(matches!(err, SignatureError::SignerMismatch { .. }));
    }

    #[test]
    fn test_did_declared_signer_mismatch() {
        let key = did_signing_key();
        let did = did_of(&key);
        let message = canonical_message(&target());
        let token = sign_jws(&key, &message);
        assert!(verify_did_signature(&message, &token, &did, "did:key:zOther").is_err());
    }

    #[test]
    fn test_did_key_decoding() {
        let key = did_signing_key();
        let decoded = did_key_to_verifying_key(&did_of(&key)).unwrap();
        assert_eq!(decoded, key.verifying_key());
        assert!(did_key_to_verifying_key("did:web:example.com").is_err());
        assert!(did_key_to_verifying_key("did:key:z111").is_err());
    }

    #[test]
    fn test_did_detached_token() {
        let key = did_signing_key();
        let did = did_of(&key);
        let message = canonical_message(&target());
        let token = sign_detached_jws(&key, &message, &format!("{did}#key-1"));
        assert!(verify_did_signature(&message, &token, &did, &did).is_ok());
    }

    #[test]
    fn test_did_detached_token_over_other_message() {
        let key = did_signing_key();
        let did = did_of(&key);
        let signed = canonical_message(&crate::algorithms::hashing::digest("other page"));
        let token = sign_detached_jws(&key, &signed, &did);
        assert_eq!(
            verify_did_signature(&canonical_message(&target()), &token, &did, &did),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn test_did_kid_extending_did_rejected() {
        let key = did_signing_key();
        let did = did_of(&key);
        let message = canonical_message(&target());
        let token = sign_detached_jws(&key, &message, &format!("{did}X#key-1"));
        assert!(matches!(
            verify_did_signature(&message, &token, &did, &did),
            Err(SignatureError::SignerMismatch { .. })
        ));
    }
}
