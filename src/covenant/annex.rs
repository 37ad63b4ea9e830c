//! # Signature Embedding
//!
//! Signs the follow-on transaction with the ephemeral key and stores the
//! signature in the committing transaction's first-input auxiliary fields.
//!
//! ## Auxiliary Fields
//!
//! [`AuxiliaryFields`] is an ordered map of opaque keys to opaque values.
//! On a PSBT input it lives in the unknown key/value section: the first key
//! byte becomes the PSBT key type and the remaining bytes the key data. The
//! key `"annex"` therefore serializes as the bytes `61 6e 6e 65 78` inside the
//! input map, which a finalizer can copy into the witness as a BIP-341 annex.

use super::{commitment::CommittedPsbt, ephemeral_key::EphemeralKey, signing::follow_on_digest};
use crate::config::covenant::ANNEX_TAG;
use crate::error::{CovenantError, CovenantResult};
use bitcoin::{
    psbt::{raw, Input as PsbtInput},
    Psbt, Transaction,
};
use log::{debug, info};
use std::collections::BTreeMap;

/// Highest key type currently assigned to PSBT input fields
const LAST_STANDARD_INPUT_TYPE: u8 = 0x1a;

/// PSBT proprietary key type
const PROPRIETARY_TYPE: u8 = 0xfc;

/// Opaque side-channel data attached to a transaction input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxiliaryFields {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl AuxiliaryFields {
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the unknown key/value pairs of a PSBT input.
    pub fn from_psbt_input(input: &PsbtInput) -> Self {
        let entries = input
            .unknown
            .iter()
            .map(|(raw_key, value)| {
                let mut key = Vec::with_capacity(raw_key.key.len() + 1);
                key.push(raw_key.type_value);
                key.extend_from_slice(&raw_key.key);
                (key, value.clone())
            })
            .collect();
        Self { entries }
    }
}

fn to_raw_key(key: &[u8]) -> CovenantResult<raw::Key> {
    let (type_value, key_data) = key
        .split_first()
        .ok_or_else(|| CovenantError::precondition("Auxiliary field key must not be empty"))?;

    if *type_value <= LAST_STANDARD_INPUT_TYPE || *type_value == PROPRIETARY_TYPE {
        return Err(CovenantError::precondition(format!(
            "Auxiliary field key type 0x{:02x} collides with a standard PSBT input field",
            type_value
        )));
    }

    Ok(raw::Key {
        type_value: *type_value,
        key: key_data.to_vec(),
    })
}

/// Sign `follow_on` and store the signature under `field_key` on the first
/// input of the committing PSBT.
///
/// Consumes the ephemeral key. Only input metadata changes, so the txid
/// fixed by the commitment stays valid. Wallet signatures for the committing
/// inputs are not produced here.
pub fn embed(
    commitment: &mut CommittedPsbt,
    follow_on: &Transaction,
    key: EphemeralKey,
    field_key: &[u8],
) -> CovenantResult<AuxiliaryFields> {
    let spent = follow_on.input.first().map(|input| input.previous_output);
    if follow_on.input.len() != 1 || spent != Some(commitment.outpoint()) {
        return Err(CovenantError::precondition(format!(
            "Follow-on transaction must spend only the commitment output {}",
            commitment.outpoint()
        )));
    }
    let raw_key = to_raw_key(field_key)?;

    let digest = follow_on_digest(follow_on, commitment.output())?;
    let signature = key.sign(&digest);
    debug!("Follow-on {} signed", follow_on.compute_txid());

    let txid = commitment.txid();
    let input = commitment.first_input_mut()?;
    input.unknown.insert(raw_key, signature.serialize().to_vec());

    info!("Signature embedded in first input of {}", txid);
    Ok(AuxiliaryFields::from_psbt_input(input))
}

/// Signature stored under `field_key` on the first input of `psbt`, if any.
pub fn embedded_signature(psbt: &Psbt, field_key: &[u8]) -> Option<Vec<u8>> {
    let fields = AuxiliaryFields::from_psbt_input(psbt.inputs.first()?);
    fields.get(field_key).map(<[u8]>::to_vec)
}

/// Witness element a finalizer appends to the committing input: the
/// BIP-341 annex tag followed by the raw signature.
pub fn annex_witness_element(signature: &[u8]) -> Vec<u8> {
    let mut element = Vec::with_capacity(signature.len() + 1);
    element.push(ANNEX_TAG);
    element.extend_from_slice(signature);
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CovenantConfig;
    use crate::covenant::{
        build_commitment, build_follow_on,
        fixtures::{fixture_key, funding_psbt},
        signing::verify_follow_on,
    };
    use bitcoin::Witness;

    fn committed(amount: u64, key: &EphemeralKey) -> CommittedPsbt {
        build_commitment(funding_psbt(amount), 0, key, None).unwrap()
    }

    fn follow_on_for(commitment: &CommittedPsbt) -> Transaction {
        let config = CovenantConfig::default();
        build_follow_on(
            commitment.txid(),
            commitment.output_index(),
            commitment.amount(),
            &config.destination_script().unwrap(),
            config.fee(),
        )
        .unwrap()
    }

    #[test]
    fn test_embed_writes_raw_signature() {
        let key = fixture_key(31);
        let mut commitment = committed(1_000_000, &key);
        let follow_on = follow_on_for(&commitment);

        let fields = embed(&mut commitment, &follow_on, key, b"annex").unwrap();

        let signature = fields.get(b"annex").unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(
            embedded_signature(commitment.psbt(), b"annex").as_deref(),
            Some(signature)
        );

        let raw_key = raw::Key {
            type_value: b'a',
            key: b"nnex".to_vec(),
        };
        assert_eq!(
            commitment.psbt().inputs[0].unknown.get(&raw_key).map(Vec::as_slice),
            Some(signature)
        );
    }

    #[test]
    fn test_embedded_signature_verifies() {
        let key = fixture_key(32);
        let mut commitment = committed(1_000_000, &key);
        let mut follow_on = follow_on_for(&commitment);

        let fields = embed(&mut commitment, &follow_on, key, b"annex").unwrap();

        let mut witness = Witness::new();
        witness.push(fields.get(b"annex").unwrap());
        follow_on.input[0].witness = witness;
        verify_follow_on(commitment.output(), &follow_on).unwrap();
    }

    #[test]
    fn test_embed_keeps_txid_and_other_fields() {
        let key = fixture_key(33);
        let mut commitment = committed(1_000_000, &key);
        let txid = commitment.txid();
        let follow_on = follow_on_for(&commitment);

        let input = commitment.first_input_mut().unwrap();
        input.unknown.insert(to_raw_key(b"annex").unwrap(), vec![0u8; 3]);
        input.unknown.insert(to_raw_key(b"memo").unwrap(), b"keep".to_vec());

        let fields = embed(&mut commitment, &follow_on, key, b"annex").unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get(b"memo"), Some(&b"keep"[..]));
        assert_eq!(fields.get(b"annex").map(<[u8]>::len), Some(64));
        assert_eq!(commitment.psbt().unsigned_tx.compute_txid(), txid);
    }

    #[test]
    fn test_embed_leaves_unrelated_unknown_types() {
        let key = fixture_key(36);
        let mut commitment = committed(1_000_000, &key);
        let follow_on = follow_on_for(&commitment);

        let foreign = raw::Key {
            type_value: LAST_STANDARD_INPUT_TYPE,
            key: vec![0xab, 0xcd],
        };
        commitment
            .first_input_mut()
            .unwrap()
            .unknown
            .insert(foreign.clone(), vec![0x01]);

        let fields = embed(&mut commitment, &follow_on, key, b"annex").unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get(&[0x1a, 0xab, 0xcd]), Some(&[0x01][..]));
        assert_eq!(fields.get(b"annex").map(<[u8]>::len), Some(64));
        assert_eq!(
            commitment.psbt().inputs[0].unknown.get(&foreign),
            Some(&vec![0x01])
        );
    }

    #[test]
    fn test_embed_rejects_foreign_follow_on() {
        let key = fixture_key(34);
        let mut commitment = committed(1_000_000, &key);
        let mut follow_on = follow_on_for(&commitment);
        follow_on.input[0].previous_output.vout = 1;

        let err = embed(&mut commitment, &follow_on, key, b"annex").unwrap_err();

        assert!(matches!(err, CovenantError::Precondition { .. }));
        assert!(embedded_signature(commitment.psbt(), b"annex").is_none());
    }

    #[test]
    fn test_reserved_key_types_rejected() {
        assert!(to_raw_key(b"").is_err());
        assert!(to_raw_key(&[0x13, 0x01]).is_err());
        assert!(to_raw_key(&[0xfc, 0x01]).is_err());
        assert_eq!(to_raw_key(b"annex").unwrap().type_value, 0x61);
    }

    #[test]
    fn test_psbt_serialization_preserves_fields() {
        let key = fixture_key(35);
        let mut commitment = committed(1_000_000, &key);
        let follow_on = follow_on_for(&commitment);
        let fields = embed(&mut commitment, &follow_on, key, b"annex").unwrap();

        let encoded = commitment.into_psbt().serialize();
        let decoded = Psbt::deserialize(&encoded).unwrap();

        assert_eq!(AuxiliaryFields::from_psbt_input(&decoded.inputs[0]), fields);
    }

    #[test]
    fn test_annex_witness_element() {
        let element = annex_witness_element(&[7u8; 64]);

        assert_eq!(element.len(), 65);
        assert_eq!(element[0], 0x50);
        assert_eq!(&element[1..], &[7u8; 64][..]);
    }
}
