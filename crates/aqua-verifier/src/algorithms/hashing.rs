//! # Hash Model
//!
//! Deterministic hashes over revision fields. Every digest is SHA3-512 in
//! lowercase hex, and components are joined by plain string concatenation.
//!
//! ## Empty input
//!
//! `digest("")` is `""`, not the hash of the empty string. An absent
//! signature or witness therefore contributes nothing to the verification
//! hash.

use sha3::{Digest, Sha3_512};
use shared_types::{ContentSlots, Hash};

/// SHA3-512 of `text`, lowercase hex. Empty input maps to `""`.
pub fn digest(text: &str) -> Hash {
    if text.is_empty() {
        return Hash::new();
    }
    digest_bytes(text.as_bytes())
}

/// SHA3-512 of raw bytes, lowercase hex. Used for wrapped files.
pub fn digest_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Sha3_512::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash over the slot values in declaration order.
pub fn content_hash(slots: &ContentSlots) -> Hash {
    let joined: String = slots.values().map(String::as_str).collect();
    digest(&joined)
}

/// Hash over domain, timestamp and chain linkage.
pub fn metadata_hash(
    domain_id: &str,
    time_stamp: &str,
    previous_verification_hash: &str,
    merge_hash: &str,
) -> Hash {
    digest(&[domain_id, time_stamp, previous_verification_hash, merge_hash].concat())
}

/// Hash binding a signature to its public key.
pub fn signature_hash(signature: &str, public_key: &str) -> Hash {
    digest(&[signature, public_key].concat())
}

/// A revision's identity from its four components.
pub fn verification_hash(
    content_hash: &str,
    metadata_hash: &str,
    signature_hash: &str,
    witness_hash: &str,
) -> Hash {
    digest(&[content_hash, metadata_hash, signature_hash, witness_hash].concat())
}

/// Commitment anchored by a witness event.
pub fn witness_event_hash(domain_snapshot_genesis_hash: &str, merkle_root: &str) -> Hash {
    digest(&[domain_snapshot_genesis_hash, merkle_root].concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_digest_empty_is_empty() {
        assert_eq!(digest(""), "");
    }

    #[test]
    fn test_digest_known_vector() {
        // SHA3-512("abc")
        assert_eq!(
            digest("abc"),
            "b751850b1a57168a5693cd924b6b096e08f621827444f70d884f5d0240d2712e\
             10e116e9192af3c91a7ec57647e3934057340b4cf408d5a56592f8274eec53f0"
        );
    }

    #[test]
    fn test_digest_bytes_hashes_empty_input() {
        // Files are hashed even when empty.
        assert_eq!(digest_bytes(b"").len(), 128);
    }

    #[test]
    fn test_content_order_sensitivity() {
        let mut ab = ContentSlots::new();
        ab.insert("a".into(), "1".into());
        ab.insert("b".into(), "2".into());
        let mut ba = ContentSlots::new();
        ba.insert("b".into(), "2".into());
        ba.insert("a".into(), "1".into());

        assert_eq!(content_hash(&ab), digest("12"));
        assert_eq!(content_hash(&ba), digest("21"));
        assert_ne!(content_hash(&ab), content_hash(&ba));
    }

    #[test]
    fn test_metadata_hash_defaults() {
        assert_eq!(
            metadata_hash("domain", "20221213151018", "", ""),
            digest("domain20221213151018")
        );
    }

    #[test]
    fn test_verification_hash_with_absent_components() {
        let c = digest("content");
        let m = digest("metadata");
        assert_eq!(verification_hash(&c, &m, "", ""), digest(&format!("{c}{m}")));
    }

    proptest! {
        #[test]
        fn prop_digest_is_lowercase_hex(text in ".+") {
            let h = digest(&text);
            prop_assert_eq!(h.len(), 128);
            prop_assert!(h.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        #[test]
        fn prop_digest_is_deterministic(text in ".*") {
            prop_assert_eq!(digest(&text), digest(&text));
        }

        #[test]
        fn prop_self_consistency_round_trip(
            content in "[a-z0-9 ]{1,32}",
            domain in "[a-z0-9]{1,16}",
            ts in "[0-9]{14}",
        ) {
            let mut slots = ContentSlots::new();
            slots.insert("main".into(), content);
            let c = content_hash(&slots);
            let m = metadata_hash(&domain, &ts, "", "");
            let v = verification_hash(&c, &m, "", "");
            prop_assert_eq!(v, digest(&format!("{c}{m}")));
        }
    }
}
