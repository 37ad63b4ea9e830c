//! # Commitment Output
//!
//! Rewrites the placeholder output of a funded PSBT into a key-path-only
//! taproot output locked to the ephemeral key, and freezes the resulting
//! transaction id in the [`CommittedPsbt`] phase type.

use super::ephemeral_key::EphemeralKey;
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{
    psbt::{Input as PsbtInput, Output as PsbtOutput},
    Amount, OutPoint, Psbt, Script, ScriptBuf, TxOut, Txid,
};
use log::{debug, info};

/// A PSBT whose commitment output is written and whose txid is final.
///
/// This is the only value the signature embedder accepts. It exposes no way
/// to touch the unsigned transaction: any change there would alter the txid
/// the follow-on transaction spends from and void the embedded signature.
#[derive(Debug)]
pub struct CommittedPsbt {
    psbt: Psbt,
    txid: Txid,
    output_index: u32,
    output: TxOut,
}

impl CommittedPsbt {
    /// Final id of the committing transaction
    pub fn txid(&self) -> Txid {
        self.txid
    }

    pub fn output_index(&self) -> u32 {
        self.output_index
    }

    /// Outpoint the follow-on transaction spends
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.output_index)
    }

    /// The commitment output (P2TR script and unchanged amount)
    pub fn output(&self) -> &TxOut {
        &self.output
    }

    pub fn amount(&self) -> Amount {
        self.output.value
    }

    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// PSBT metadata of the first input. Input maps are not part of the txid.
    pub(crate) fn first_input_mut(&mut self) -> CovenantResult<&mut PsbtInput> {
        self.psbt
            .inputs
            .first_mut()
            .ok_or_else(|| CovenantError::precondition("Committing PSBT has no inputs"))
    }

    /// Hand the PSBT back for wallet signing.
    pub fn into_psbt(self) -> Psbt {
        self.psbt
    }
}

/// Turn the placeholder output at `output_index` into the commitment output.
///
/// When `placeholder` is given the output must currently hold exactly that
/// script. The amount is preserved, any per-output PSBT metadata is reset and
/// the txid is computed from the rewritten transaction.
pub fn build_commitment(
    mut funding: Psbt,
    output_index: u32,
    key: &EphemeralKey,
    placeholder: Option<&Script>,
) -> CovenantResult<CommittedPsbt> {
    let count = funding.unsigned_tx.output.len();
    if funding.outputs.len() != count {
        return Err(CovenantError::precondition(format!(
            "PSBT carries {} output maps for {} outputs",
            funding.outputs.len(),
            count
        )));
    }
    if funding.unsigned_tx.input.is_empty() || funding.inputs.is_empty() {
        return Err(CovenantError::precondition("Funding transaction has no inputs"));
    }

    let index = output_index as usize;
    let current_script = match funding.unsigned_tx.output.get(index) {
        Some(output) => &output.script_pubkey,
        None => {
            return Err(CovenantError::OutputNotFound {
                index: output_index,
                count,
            })
        }
    };
    if let Some(placeholder) = placeholder {
        if current_script.as_script() != placeholder {
            return Err(CovenantError::NotPlaceholder {
                index: output_index,
            });
        }
    }

    funding.unsigned_tx.output[index].script_pubkey = ScriptBuf::new_p2tr_tweaked(key.output_key());
    funding.outputs[index] = PsbtOutput::default();

    let output = funding.unsigned_tx.output[index].clone();
    let txid = funding.unsigned_tx.compute_txid();

    debug!(
        "Commitment output {} locked to {} ({} sats)",
        output_index,
        key.output_key(),
        output.value.to_sat()
    );
    info!("Committing transaction id fixed at {}", txid);

    Ok(CommittedPsbt {
        psbt: funding,
        txid,
        output_index,
        output,
    })
}
