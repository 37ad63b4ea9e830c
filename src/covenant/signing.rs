//! # Follow-on Sighash and Verification
//!
//! BIP-341 key-path sighash of the follow-on transaction and the matching
//! BIP-340 verification. The commitment output is the only prevout, so the
//! digest covers exactly one input and one output.

use crate::config::covenant::SIGNATURE_LEN;
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{
    hashes::Hash,
    secp256k1::{schnorr, Message, Secp256k1, XOnlyPublicKey},
    sighash::{Prevouts, SighashCache},
    OutPoint, TapSighashType, Transaction, TxOut,
};

/// Digest the ephemeral key signs: taproot key-spend sighash of input 0,
/// default hash type, with the commitment output as the single prevout.
pub fn follow_on_digest(
    follow_on: &Transaction,
    commitment_output: &TxOut,
) -> CovenantResult<Message> {
    if follow_on.input.len() != 1 || follow_on.output.len() != 1 {
        return Err(CovenantError::precondition(format!(
            "Follow-on transaction must have one input and one output, got {} and {}",
            follow_on.input.len(),
            follow_on.output.len()
        )));
    }

    let prevouts = [commitment_output];
    let mut sighash_cache = SighashCache::new(follow_on);
    let sighash = sighash_cache
        .taproot_key_spend_signature_hash(0, &Prevouts::All(&prevouts), TapSighashType::Default)
        .map_err(|e| CovenantError::crypto(format!("Sighash computation failed: {}", e)))?;

    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Parse a raw 64-byte BIP-340 signature.
pub fn parse_signature(bytes: &[u8]) -> CovenantResult<schnorr::Signature> {
    if bytes.len() != SIGNATURE_LEN {
        return Err(CovenantError::MalformedSignature {
            length: bytes.len(),
        });
    }
    schnorr::Signature::from_slice(bytes).map_err(|_| CovenantError::MalformedSignature {
        length: bytes.len(),
    })
}

/// Output key of a P2TR script (`OP_1 <32 bytes>`).
pub fn taproot_output_key(commitment_output: &TxOut) -> CovenantResult<XOnlyPublicKey> {
    let script = &commitment_output.script_pubkey;
    if !script.is_p2tr() {
        return Err(CovenantError::precondition(
            "Commitment output is not a taproot output",
        ));
    }
    XOnlyPublicKey::from_slice(&script.as_bytes()[2..])
        .map_err(|e| CovenantError::crypto(format!("Invalid taproot output key: {}", e)))
}

/// Check the follow-on's sole witness element is a valid key-path signature
/// for the commitment output.
pub fn verify_follow_on(commitment_output: &TxOut, follow_on: &Transaction) -> CovenantResult<()> {
    let output_key = taproot_output_key(commitment_output)?;
    let witness = &follow_on
        .input
        .first()
        .ok_or_else(|| CovenantError::precondition("Follow-on transaction has no inputs"))?
        .witness;
    if witness.len() != 1 {
        return Err(CovenantError::WitnessLayout {
            expected: 1,
            actual: witness.len(),
        });
    }
    let signature = parse_signature(witness.nth(0).unwrap_or_default())?;
    let digest = follow_on_digest(follow_on, commitment_output)?;

    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(&signature, &digest, &output_key)
        .map_err(|e| CovenantError::crypto(format!("Follow-on signature does not verify: {}", e)))
}

/// Verify a follow-on transaction against the full committing transaction.
///
/// The follow-on must spend `commitment_tx:output_index`, and its signature
/// must be valid for that output.
pub fn verify_spend(
    commitment_tx: &Transaction,
    follow_on: &Transaction,
    output_index: u32,
) -> CovenantResult<()> {
    let expected = OutPoint::new(commitment_tx.compute_txid(), output_index);
    let spent = follow_on.input.first().map(|input| input.previous_output);
    if spent != Some(expected) {
        return Err(CovenantError::precondition(format!(
            "Follow-on transaction does not spend {}",
            expected
        )));
    }

    let commitment_output = commitment_tx
        .output
        .get(output_index as usize)
        .ok_or(CovenantError::OutputNotFound {
            index: output_index,
            count: commitment_tx.output.len(),
        })?;

    verify_follow_on(commitment_output, follow_on)
}
