//! # Shared Types Crate
//!
//! The revision wire model shared by the verifier and the CLI.
//!
//! ## Design Principles
//!
//! - **Bit-exact contract**: serialized field names match what producers emit.
//! - **Order is data**: content slots and chain revisions keep declaration order,
//!   since both feed order-sensitive hashes.

pub mod chain;
pub mod entities;
pub mod errors;

pub use chain::{Chain, ExportedChain};
pub use entities::*;
pub use errors::*;
