//! # Adapters
//!
//! Witness backends for the three network kinds.
//!
//! | Adapter | Kind | Transport |
//! |---------|------|-----------|
//! | `EthereumWitness` | on-chain | JSON-RPC over HTTP |
//! | `NostrWitness` | relay | websocket |
//! | `TsaWitness` | timestamp authority | RFC 3161 over HTTP |

pub mod der;
pub mod ethereum;
pub mod nostr;
pub mod tsa;

pub use ethereum::EthereumWitness;
pub use nostr::NostrWitness;
pub use tsa::TsaWitness;
