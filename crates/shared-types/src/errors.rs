//! # Error Types
//!
//! Errors raised while loading a revision chain.

use thiserror::Error;

/// Errors that can occur while loading or assembling a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chain document is not valid JSON for the revision model.
    #[error("Failed to parse chain: {0}")]
    Parse(#[from] serde_json::Error),

    /// The same verification hash appears twice.
    #[error("Duplicate revision: {0}")]
    DuplicateRevision(String),
}
