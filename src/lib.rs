//! # Ephemeral Covenant: Single-Use Key Covenants for Bitcoin
//!
//! Commits a transaction output to one pre-signed follow-on spend using a
//! throwaway Schnorr key, and carries the follow-on signature in the annex of
//! the committing transaction so the spend can be rebuilt from chain data.

pub mod config;
pub mod covenant;
pub mod error;
pub mod services;

// Re-export commonly used types
pub use config::CovenantConfig;
pub use covenant::{commit, commit_base64, reconstruct_spend, reconstruct_spend_hex, EphemeralKey};
pub use error::{CovenantError, CovenantResult};
pub use services::NodeClient;
