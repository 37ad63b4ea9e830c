//! # Follow-on Transaction
//!
//! Builds the one transaction allowed to spend a commitment output. The
//! construction has no degrees of freedom beyond its arguments, so the
//! committing side and any later reconstruction produce the same bytes and
//! therefore the same sighash.
//!
//! ## Transaction Structure
//! - **Version**: 1
//! - **Locktime**: 0
//! - **Input**: commitment outpoint, empty script sig, sequence 0
//! - **Output**: destination script with `commitment_amount - fee`

use crate::error::{CovenantError, CovenantResult};
use bitcoin::{
    absolute::LockTime, transaction::Version, Amount, OutPoint, Script, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid, Witness,
};

/// Fixed follow-on transaction version
pub const FOLLOW_ON_VERSION: Version = Version::ONE;

/// Fixed sequence of the follow-on input
pub const FOLLOW_ON_SEQUENCE: Sequence = Sequence::ZERO;

/// Build the follow-on transaction spending `commitment_txid:commitment_index`.
///
/// # Errors
/// `InsufficientAmount` when `commitment_amount <= fee`, since the output
/// value would be zero or negative.
pub fn build_follow_on(
    commitment_txid: Txid,
    commitment_index: u32,
    commitment_amount: Amount,
    destination: &Script,
    fee: Amount,
) -> CovenantResult<Transaction> {
    let value = commitment_amount
        .checked_sub(fee)
        .filter(|value| *value > Amount::ZERO)
        .ok_or(CovenantError::InsufficientAmount {
            amount: commitment_amount.to_sat(),
            fee: fee.to_sat(),
        })?;

    let input = TxIn {
        previous_output: OutPoint::new(commitment_txid, commitment_index),
        script_sig: ScriptBuf::new(),
        sequence: FOLLOW_ON_SEQUENCE,
        witness: Witness::new(),
    };

    let output = TxOut {
        value,
        script_pubkey: destination.to_owned(),
    };

    Ok(Transaction {
        version: FOLLOW_ON_VERSION,
        lock_time: LockTime::ZERO,
        input: vec![input],
        output: vec![output],
    })
}
