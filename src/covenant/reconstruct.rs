//! # Follow-on Reconstruction
//!
//! Recovers the pre-signed follow-on transaction from a broadcast committing
//! transaction. Anyone holding the raw committing transaction can do this;
//! the ephemeral key is long gone by then.
//!
//! ## Witness Layout
//! The committing transaction's first input is read as a two-element
//! taproot key-path witness with an annex:
//! ```text
//! [0] <wallet signature>
//! [1] <type byte> || <64-byte follow-on signature>
//! ```
//! The type byte is dropped without interpretation. A value other than the
//! BIP-341 annex tag is logged but tolerated.

use super::{follow_on::build_follow_on, signing::parse_signature};
use crate::config::{
    covenant::{ANNEX_TAG, SIGNATURE_LEN},
    CovenantConfig,
};
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{consensus::encode::deserialize, secp256k1::schnorr, Transaction, Witness};
use log::{debug, info, warn};

/// Number of witness elements expected on the committing input
const COMMITTING_WITNESS_LEN: usize = 2;

/// Pull the embedded follow-on signature out of the first input's witness.
pub fn extract_signature(commitment_tx: &Transaction) -> CovenantResult<schnorr::Signature> {
    let witness = &commitment_tx
        .input
        .first()
        .ok_or_else(|| CovenantError::decode("Committing transaction has no inputs"))?
        .witness;

    if witness.len() != COMMITTING_WITNESS_LEN {
        return Err(CovenantError::WitnessLayout {
            expected: COMMITTING_WITNESS_LEN,
            actual: witness.len(),
        });
    }

    let element = witness.nth(1).unwrap_or_default();
    let (type_byte, signature) = element
        .split_first()
        .ok_or(CovenantError::MalformedSignature { length: 0 })?;

    if signature.len() != SIGNATURE_LEN {
        return Err(CovenantError::MalformedSignature {
            length: signature.len(),
        });
    }
    if *type_byte != ANNEX_TAG {
        warn!(
            "Witness element carries type byte 0x{:02x}, expected annex tag 0x{:02x}",
            type_byte, ANNEX_TAG
        );
    }

    parse_signature(signature)
}

/// Rebuild the witnessed follow-on transaction from raw committing
/// transaction bytes.
pub fn reconstruct(
    raw_commitment_tx: &[u8],
    config: &CovenantConfig,
) -> CovenantResult<Transaction> {
    let commitment_tx: Transaction = deserialize(raw_commitment_tx).map_err(|e| {
        CovenantError::decode(format!("Error deserializing committing transaction: {}", e))
    })?;

    let signature = extract_signature(&commitment_tx)?;

    let txid = commitment_tx.compute_txid();
    let commitment_output = commitment_tx
        .output
        .get(config.output_index as usize)
        .ok_or(CovenantError::OutputNotFound {
            index: config.output_index,
            count: commitment_tx.output.len(),
        })?;
    debug!(
        "Commitment output {}:{} holds {} sats",
        txid,
        config.output_index,
        commitment_output.value.to_sat()
    );

    let mut follow_on = build_follow_on(
        txid,
        config.output_index,
        commitment_output.value,
        &config.destination_script()?,
        config.fee(),
    )?;

    let mut witness = Witness::new();
    witness.push(signature.serialize());
    follow_on.input[0].witness = witness;

    info!("Reconstructed follow-on {} spending {}", follow_on.compute_txid(), txid);
    Ok(follow_on)
}
