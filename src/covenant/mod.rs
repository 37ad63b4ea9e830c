//! # Annex Covenant
//!
//! Restricts a freshly created output to one pre-signed spend without any
//! covenant opcode. The output is locked to a single-use key, that key signs
//! the only follow-on transaction and is then dropped, and the signature
//! travels inside the committing transaction so it can be recovered from the
//! chain.
//!
//! ## Flow
//!
//! ```text
//! funded PSBT ──commit──> committed PSBT ──wallet sign + finalize──> broadcast tx
//!  (placeholder)          (P2TR output,                              (annex on input 0)
//!                          sig in input 0 fields)                          │
//!                                                                          │ reconstruct_spend
//!                                                                          ▼
//!                                                                  follow-on tx
//!                                                                  (amount - fee to destination)
//! ```
//!
//! ## Phases
//! - **Committed**: [`build_commitment`] rewrites the output and fixes the txid
//! - **Signed**: [`embed`] stores the follow-on signature and consumes the key
//! - **Reconstructable**: [`reconstruct`] rebuilds the spend from ledger bytes

pub mod annex;
pub mod commitment;
pub mod ephemeral_key;
pub mod follow_on;
pub mod reconstruct;
pub mod signing;

#[cfg(test)]
mod fixtures;

pub use annex::{annex_witness_element, embed, embedded_signature, AuxiliaryFields};
pub use commitment::{build_commitment, CommittedPsbt};
pub use ephemeral_key::EphemeralKey;
pub use follow_on::build_follow_on;
pub use reconstruct::{extract_signature, reconstruct};
pub use signing::{follow_on_digest, verify_follow_on, verify_spend};

use crate::config::CovenantConfig;
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{consensus::encode::serialize_hex, Psbt, Transaction};
use std::str::FromStr;

/// Commit a funded PSBT to its follow-on spend with a fresh ephemeral key.
///
/// Returns the same PSBT with the placeholder output rewritten and the
/// follow-on signature stored on its first input. Wallet signatures are
/// still missing.
pub fn commit(funding: Psbt, config: &CovenantConfig) -> CovenantResult<Psbt> {
    commit_with_key(funding, config, EphemeralKey::issue()?)
}

/// [`commit`] with a caller-supplied key. The key is consumed either way.
pub fn commit_with_key(
    funding: Psbt,
    config: &CovenantConfig,
    key: EphemeralKey,
) -> CovenantResult<Psbt> {
    let placeholder = config.placeholder_script()?;
    let destination = config.destination_script()?;

    let mut commitment =
        build_commitment(funding, config.output_index, &key, placeholder.as_deref())?;
    let follow_on = build_follow_on(
        commitment.txid(),
        commitment.output_index(),
        commitment.amount(),
        &destination,
        config.fee(),
    )?;
    embed(&mut commitment, &follow_on, key, config.field_key.as_bytes())?;

    Ok(commitment.into_psbt())
}

/// [`commit`] over the base64 PSBT transport encoding.
pub fn commit_base64(funding_base64: &str, config: &CovenantConfig) -> CovenantResult<String> {
    let funding = Psbt::from_str(funding_base64.trim())
        .map_err(|e| CovenantError::decode(format!("Invalid PSBT: {}", e)))?;
    Ok(commit(funding, config)?.to_string())
}

/// Rebuild the broadcastable follow-on transaction from a committing
/// transaction's raw bytes.
pub fn reconstruct_spend(
    raw_commitment_tx: &[u8],
    config: &CovenantConfig,
) -> CovenantResult<Transaction> {
    reconstruct(raw_commitment_tx, config)
}

/// [`reconstruct_spend`] over hex in and hex out.
pub fn reconstruct_spend_hex(
    commitment_hex: &str,
    config: &CovenantConfig,
) -> CovenantResult<String> {
    let raw = hex::decode(commitment_hex.trim())
        .map_err(|e| CovenantError::decode(format!("Invalid transaction hex: {}", e)))?;
    Ok(serialize_hex(&reconstruct_spend(&raw, config)?))
}
