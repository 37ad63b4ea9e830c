//! Shared test fixtures.

use super::EphemeralKey;
use crate::config::covenant::PLACEHOLDER_SCRIPT_HEX;
use bitcoin::{
    absolute::LockTime, hashes::Hash, secp256k1::SecretKey, transaction::Version, Amount, OutPoint,
    Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

/// Deterministic ephemeral key from a repeated byte
pub fn fixture_key(byte: u8) -> EphemeralKey {
    EphemeralKey::from_secret_key(SecretKey::from_slice(&[byte; 32]).unwrap())
}

pub fn placeholder_script() -> ScriptBuf {
    ScriptBuf::from_bytes(hex::decode(PLACEHOLDER_SCRIPT_HEX).unwrap())
}

/// Unsigned wallet-funded PSBT: one input, the placeholder at index 0 and a
/// change output at index 1.
pub fn funding_psbt(amount_sats: u64) -> Psbt {
    let change_key = fixture_key(0x11);
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array([0xab; 32]), 1),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        }],
        output: vec![
            TxOut {
                value: Amount::from_sat(amount_sats),
                script_pubkey: placeholder_script(),
            },
            TxOut {
                value: Amount::from_sat(48_000),
                script_pubkey: ScriptBuf::new_p2tr_tweaked(change_key.output_key()),
            },
        ],
    };
    Psbt::from_unsigned_tx(tx).unwrap()
}

/// What the ledger sees once a wallet has signed the committing PSBT and a
/// finalizer has appended `second_element` to the first input's witness.
pub fn broadcast_tx(psbt: &Psbt, second_element: Vec<u8>) -> Transaction {
    let mut tx = psbt.unsigned_tx.clone();
    tx.input[0].witness = Witness::from_slice(&[vec![0x01; 64], second_element]);
    tx
}
