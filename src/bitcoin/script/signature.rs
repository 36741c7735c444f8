use crate::bitcoin::script::base::remove_all_instances_of;
use crate::bitcoin::script::op::OP_CODESEPARATOR;
use crate::bitcoin::{Encodable, Hash, PrivateKey, Tx};
use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use secp256k1::{ecdsa::Signature, Message, Secp256k1};

/// SIGHASH_ALL base mode.
pub const SIGHASH_ALL: u8 = 0x01;
/// SIGHASH_NONE base mode.
pub const SIGHASH_NONE: u8 = 0x02;
/// SIGHASH_SINGLE base mode.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Flag that restricts the signature to the signed input.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Signature hash types for the signing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigHashType {
    /// Sign all inputs and outputs (default).
    All = 0x01,
    /// Sign all inputs, but no outputs.
    None = 0x02,
    /// Sign all inputs and the output with the same index.
    Single = 0x03,
    /// All | AnyoneCanPay
    AllAnyoneCanPay = 0x81,
    /// None | AnyoneCanPay
    NoneAnyoneCanPay = 0x82,
    /// Single | AnyoneCanPay
    SingleAnyoneCanPay = 0x83,
}

impl SigHashType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match (byte & 0x1f, byte & SIGHASH_ANYONECANPAY != 0) {
            (SIGHASH_ALL, false) => Some(SigHashType::All),
            (SIGHASH_ALL, true) => Some(SigHashType::AllAnyoneCanPay),
            (SIGHASH_NONE, false) => Some(SigHashType::None),
            (SIGHASH_NONE, true) => Some(SigHashType::NoneAnyoneCanPay),
            (SIGHASH_SINGLE, false) => Some(SigHashType::Single),
            (SIGHASH_SINGLE, true) => Some(SigHashType::SingleAnyoneCanPay),
            _ => None,
        }
    }

    pub fn anyone_can_pay(&self) -> bool {
        (*self as u8) & SIGHASH_ANYONECANPAY != 0
    }
}

impl Tx {
    /// Calculate the signature hash binding a signature to input `input_index` of this
    /// transaction.
    ///
    /// `subscript` is the script being satisfied, already cut at the last
    /// OP_CODESEPARATOR and with signature pushes removed. `sighash_byte` is the raw
    /// trailing byte of the signature; bits it does not define are ignored, with
    /// unrecognized base modes hashing like SIGHASH_ALL as the reference client does.
    pub fn hash_for_signature(
        &self,
        input_index: usize,
        subscript: &[u8],
        sighash_byte: u8,
    ) -> Result<Hash> {
        signature_hash(self, input_index, subscript, sighash_byte)
    }
}

/// See [Tx::hash_for_signature].
pub fn signature_hash(
    tx: &Tx,
    input_index: usize,
    subscript: &[u8],
    sighash_byte: u8,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(Error::BadArgument(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }

    let base_mode = sighash_byte & 0x1f;
    let anyone_can_pay = sighash_byte & SIGHASH_ANYONECANPAY != 0;

    // The reference client returns the digest of the number one for a SIGHASH_SINGLE
    // signature over a missing output instead of failing.
    if base_mode == SIGHASH_SINGLE && input_index >= tx.outputs.len() {
        let mut one = Hash::ZERO;
        one.raw[0] = 1;
        return Ok(one);
    }

    // any OP_CODESEPARATOR remaining in the subscript is not signed
    let subscript = remove_all_instances_of(subscript, &[OP_CODESEPARATOR]);

    let mut tx_copy = tx.clone();

    // inputs other than the signed one carry empty scripts
    for input in &mut tx_copy.inputs {
        input.script = Bytes::new();
    }
    tx_copy.inputs[input_index].script = Bytes::from(subscript);

    match base_mode {
        SIGHASH_NONE => {
            // no outputs are signed, and other inputs' sequences are blanked so miners
            // may update them
            tx_copy.outputs.clear();
            for (i, input) in tx_copy.inputs.iter_mut().enumerate() {
                if i != input_index {
                    input.sequence = 0;
                }
            }
        }
        SIGHASH_SINGLE => {
            // only the output paired with this input is signed; lower outputs are
            // replaced by empty placeholders
            tx_copy.outputs.truncate(input_index + 1);
            for output in tx_copy.outputs.iter_mut().take(input_index) {
                output.value = u64::MAX;
                output.script = Bytes::new();
            }
            for (i, input) in tx_copy.inputs.iter_mut().enumerate() {
                if i != input_index {
                    input.sequence = 0;
                }
            }
        }
        // SIGHASH_ALL and unrecognized modes sign all outputs
        _ => {}
    }

    if anyone_can_pay {
        let input = tx_copy.inputs[input_index].clone();
        tx_copy.inputs.clear();
        tx_copy.inputs.push(input);
    }

    let mut buffer = BytesMut::with_capacity(tx_copy.encoded_size() as usize + 4);
    tx_copy.to_binary(&mut buffer)?;
    buffer.put_u32_le(sighash_byte as u32);

    Ok(Hash::sha256d(&buffer))
}

/// Sign input `input_index` of `tx`, producing the DER signature with the sighash type
/// byte appended, as pushed by a scriptSig.
pub fn sign_input(
    tx: &Tx,
    input_index: usize,
    subscript: &[u8],
    private_key: &PrivateKey,
    sighash_type: SigHashType,
) -> Result<Bytes> {
    let sighash = signature_hash(tx, input_index, subscript, sighash_type as u8)?;
    let message = Message::from_digest(sighash.raw);

    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(message, &private_key.inner);

    let mut sig_bytes = signature.serialize_der().to_vec();
    sig_bytes.push(sighash_type as u8);
    Ok(Bytes::from(sig_bytes))
}

/// Verify a signature (with trailing sighash type byte) for a transaction input.
///
/// Errors are returned for malformed signatures and keys; the signature opcodes treat
/// those the same as a clean `false`.
pub fn verify_signature(
    sig_bytes: &[u8],
    pubkey_bytes: &[u8],
    tx: &Tx,
    input_index: usize,
    subscript: &[u8],
) -> Result<bool> {
    if sig_bytes.is_empty() {
        return Ok(false);
    }
    let sighash_byte = sig_bytes[sig_bytes.len() - 1];
    let signature = Signature::from_der(&sig_bytes[..sig_bytes.len() - 1])?;
    let pubkey = secp256k1::PublicKey::from_slice(pubkey_bytes)?;

    let sighash = signature_hash(tx, input_index, subscript, sighash_byte)?;
    let message = Message::from_digest(sighash.raw);

    let secp = Secp256k1::new();
    Ok(secp.verify_ecdsa(message, &signature, &pubkey).is_ok())
}
