//! # Revision Chain
//!
//! An ordered mapping from verification hash to revision, genesis first,
//! plus the JSON loader used by the CLI.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entities::{Hash, Revision};
use crate::errors::ChainError;

/// Ordered revision history. Keys are verification hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain {
    revisions: IndexMap<Hash, Revision>,
}

impl Chain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a revision under its verification hash.
    pub fn push(&mut self, verification_hash: impl Into<Hash>, revision: Revision) -> Result<(), ChainError> {
        let key = verification_hash.into();
        if self.revisions.contains_key(&key) {
            return Err(ChainError::DuplicateRevision(key));
        }
        self.revisions.insert(key, revision);
        Ok(())
    }

    /// Number of revisions.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Check if the chain has no revisions.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Revision at position `index` in chain order.
    pub fn get_index(&self, index: usize) -> Option<(&Hash, &Revision)> {
        self.revisions.get_index(index)
    }

    /// The most recent revision.
    pub fn tip(&self) -> Option<(&Hash, &Revision)> {
        self.revisions.last()
    }

    /// Iterate in chain order (genesis first).
    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &Revision)> {
        self.revisions.iter()
    }
}

/// On-disk export format: `{"revisions": {<hash>: <revision>, ...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportedChain {
    /// Revisions in chain order.
    #[serde(default)]
    pub revisions: Chain,
}

impl ExportedChain {
    /// Parse an exported chain from a JSON string.
    pub fn from_json(json: &str) -> Result<Chain, ChainError> {
        let exported: Self = serde_json::from_str(json)?;
        Ok(exported.revisions)
    }

    /// Load an exported chain from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Chain, ChainError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Save a chain in export format.
    pub fn save<P: AsRef<Path>>(chain: &Chain, path: P) -> Result<(), ChainError> {
        let exported = Self {
            revisions: chain.clone(),
        };
        let json = serde_json::to_string_pretty(&exported)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RevisionContent, RevisionMetadata};

    fn make_revision(prev: &str) -> Revision {
        Revision {
            verification_hash: None,
            content: RevisionContent::default(),
            metadata: RevisionMetadata {
                domain_id: "domain".to_string(),
                time_stamp: "20240101000000".to_string(),
                previous_verification_hash: prev.to_string(),
                merge_hash: None,
                metadata_hash: String::new(),
            },
            signature: None,
            witness: None,
        }
    }

    #[test]
    fn test_push_keeps_order() {
        let mut chain = Chain::new();
        chain.push("h1", make_revision("")).unwrap();
        chain.push("h2", make_revision("h1")).unwrap();
        chain.push("h3", make_revision("h2")).unwrap();

        let keys: Vec<&str> = chain.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["h1", "h2", "h3"]);
        assert_eq!(chain.tip().unwrap().0, "h3");
        assert!(chain.get_index(3).is_none());
    }

    #[test]
    fn test_push_duplicate_rejected() {
        let mut chain = Chain::new();
        chain.push("h1", make_revision("")).unwrap();
        assert!(matches!(
            chain.push("h1", make_revision("")),
            Err(ChainError::DuplicateRevision(_))
        ));
    }

    #[test]
    fn test_from_json_preserves_file_order() {
        let json = r#"{"revisions": {
            "zz": {"content": {"content_hash": ""}, "metadata": {"domain_id": "d", "time_stamp": "t", "metadata_hash": ""}},
            "aa": {"content": {"content_hash": ""}, "metadata": {"domain_id": "d", "time_stamp": "t", "previous_verification_hash": "zz", "metadata_hash": ""}}
        }}"#;
        let chain = ExportedChain::from_json(json).unwrap();
        let keys: Vec<&str> = chain.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zz", "aa"]);
    }

    #[test]
    fn test_empty_document_is_empty_chain() {
        let chain = ExportedChain::from_json("{}").unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");

        let mut chain = Chain::new();
        chain.push("h1", make_revision("")).unwrap();
        ExportedChain::save(&chain, &path).unwrap();

        let loaded = ExportedChain::load(&path).unwrap();
        assert_eq!(chain, loaded);
    }

    #[test]
    fn test_load_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not valid json").unwrap();

        assert!(matches!(ExportedChain::load(&path), Err(ChainError::Parse(_))));
    }
}
