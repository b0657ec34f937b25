//! # Revision Entities
//!
//! The revision wire model. Field names are the serialized contract that
//! other tooling produces, so they must not be renamed.
//!
//! ## Clusters
//!
//! - **Revision**: `Revision`, `RevisionContent`, `FileContent`, `RevisionMetadata`
//! - **Attestation**: `RevisionSignature`, `RevisionWitness`, `MerkleProofNode`

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A lowercase hex SHA3-512 digest, or the empty string for an absent component.
pub type Hash = String;

/// Ordered content slots. Iteration order is declaration order.
pub type ContentSlots = IndexMap<String, String>;

// =============================================================================
// CLUSTER A: THE REVISION
// =============================================================================

/// One immutable, hash-linked record in a verification chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// The revision's declared identity. When absent the chain key is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_hash: Option<Hash>,
    /// Inline content slots or a wrapped file.
    pub content: RevisionContent,
    /// Domain, timestamp and chain linkage.
    pub metadata: RevisionMetadata,
    /// Signature over the predecessor (exclusive with `witness`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<RevisionSignature>,
    /// External anchoring of the predecessor (exclusive with `signature`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<RevisionWitness>,
}

impl Revision {
    /// Hash of the predecessor, `""` for the genesis revision.
    pub fn previous_verification_hash(&self) -> &str {
        &self.metadata.previous_verification_hash
    }

    /// Whether this is the first revision of its chain.
    pub fn is_genesis(&self) -> bool {
        self.metadata.previous_verification_hash.is_empty()
    }

    /// Short form of a hash for log lines.
    pub fn short_hash(hash: &str) -> &str {
        hash.get(..16).unwrap_or(hash)
    }
}

/// Content section of a revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionContent {
    /// Named slots; order affects the content hash.
    #[serde(default)]
    pub content: ContentSlots,
    /// Declared hash over the concatenated slot values.
    pub content_hash: Hash,
    /// Wrapped file, when the revision carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileContent>,
}

/// A file wrapped by a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Raw bytes, base64 encoded.
    pub data: String,
    /// Declared hash of the decoded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<Hash>,
    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Decoded size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Metadata section of a revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMetadata {
    /// Identifier of the domain that produced the revision.
    pub domain_id: String,
    /// Creation time as written by the producer (e.g. `20221213151018`).
    pub time_stamp: String,
    /// Identity of the predecessor, `""` for genesis.
    #[serde(default)]
    pub previous_verification_hash: Hash,
    /// Hash of a merged branch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_hash: Option<Hash>,
    /// Declared metadata hash.
    pub metadata_hash: Hash,
}

// =============================================================================
// CLUSTER B: ATTESTATIONS
// =============================================================================

/// Signature attached to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSignature {
    /// Hex signature (wallet-key) or compact JWS (DID-key).
    pub signature: String,
    /// Hex public key or `did:key:` identifier.
    pub public_key: String,
    /// Declared signer address.
    pub wallet_address: String,
    /// Declared `digest(signature ‖ public_key)`.
    pub signature_hash: Hash,
    /// Explicit scheme tag; inferred from `public_key` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,
}

/// Witness attached to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionWitness {
    /// Root event of the witnessed domain snapshot.
    pub domain_snapshot_genesis_hash: Hash,
    /// Merkle root that was anchored.
    pub merkle_root: Hash,
    /// Network tag selecting the backend (`mainnet`, `nostr`, `TSA_RFC3161`, ...).
    pub witness_network: String,
    /// External reference: tx hash, relay event id or encoded timestamp token.
    pub witness_event_transaction_hash: String,
    /// Declared `digest(domain_snapshot_genesis_hash ‖ merkle_root)`.
    pub witness_event_verification_hash: Hash,
    /// Declared witness component of the verification hash.
    pub witness_hash: Hash,
    /// Inclusion proof of the target hash under `merkle_root`.
    #[serde(default)]
    pub structured_merkle_proof: Vec<MerkleProofNode>,
    /// Unix seconds at which the witness event was anchored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_timestamp: Option<i64>,
}

/// One step of a Merkle inclusion proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProofNode {
    /// Left child digest or `""`.
    #[serde(default)]
    pub left_leaf: Hash,
    /// Right child digest or `""`.
    #[serde(default)]
    pub right_leaf: Hash,
    /// Parent digest.
    #[serde(default)]
    pub successor: Hash,
}

impl MerkleProofNode {
    /// Create a proof node.
    pub fn new(left_leaf: impl Into<Hash>, right_leaf: impl Into<Hash>, successor: impl Into<Hash>) -> Self {
        Self {
            left_leaf: left_leaf.into(),
            right_leaf: right_leaf.into(),
            successor: successor.into(),
        }
    }

    /// Whether either leaf equals `leaf`.
    pub fn contains(&self, leaf: &str) -> bool {
        self.left_leaf == leaf || self.right_leaf == leaf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_slots_keep_declaration_order() {
        let json = r#"{"content": {"b": "2", "a": "1"}, "content_hash": "x"}"#;
        let content: RevisionContent = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = content.content.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_optional_sections_default_to_none() {
        let json = r#"{
            "content": {"content": {"main": "hello"}, "content_hash": "c"},
            "metadata": {"domain_id": "d", "time_stamp": "t", "metadata_hash": "m"}
        }"#;
        let revision: Revision = serde_json::from_str(json).unwrap();
        assert!(revision.signature.is_none());
        assert!(revision.witness.is_none());
        assert!(revision.is_genesis());
        assert_eq!(revision.previous_verification_hash(), "");
    }

    #[test]
    fn test_proof_node_contains() {
        let node = MerkleProofNode::new("aa", "", "aa");
        assert!(node.contains("aa"));
        assert!(node.contains(""));
        assert!(!node.contains("bb"));
    }

    #[test]
    fn test_short_hash() {
        let long = "a".repeat(128);
        assert_eq!(Revision::short_hash(&long).len(), 16);
        assert_eq!(Revision::short_hash("abc"), "abc");
    }
}
