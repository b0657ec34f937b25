//! # Merkle Proof Verification
//!
//! Checks a witness inclusion proof against a target leaf.
//!
//! # Algorithm
//!
//! 1. Start with the target as the expected leaf
//! 2. For each node in the proof:
//!    - the node's leaves must contain the expected leaf
//!    - if one leaf is empty the successor is the other leaf,
//!      otherwise `digest(left ‖ right)`
//!    - the computed successor must equal the declared one
//!    - the successor becomes the expected leaf
//! 3. An empty proof never verifies
//!
//! # Time Complexity: O(n) in proof length

use shared_types::MerkleProofNode;
use tracing::debug;

use super::hashing::digest;

/// Verify that `target_leaf` is included through `proof`.
pub fn verify_merkle_integrity(proof: &[MerkleProofNode], target_leaf: &str) -> bool {
    if proof.is_empty() {
        return false;
    }

    let mut expected_leaf = target_leaf;
    for (depth, node) in proof.iter().enumerate() {
        if !node.contains(expected_leaf) {
            debug!(depth, "[aqua] Merkle node does not contain expected leaf");
            return false;
        }

        if calculate_successor(node) != node.successor {
            debug!(depth, "[aqua] Merkle successor mismatch");
            return false;
        }

        expected_leaf = &node.successor;
    }

    true
}

/// Parent digest of a proof node.
pub fn calculate_successor(node: &MerkleProofNode) -> String {
    if node.left_leaf.is_empty() {
        node.right_leaf.clone()
    } else if node.right_leaf.is_empty() {
        node.left_leaf.clone()
    } else {
        digest(&[node.left_leaf.as_str(), node.right_leaf.as_str()].concat())
    }
}
