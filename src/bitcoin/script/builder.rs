use crate::bitcoin::script::base::{write_push_data, Script};
use crate::bitcoin::script::num::encode_script_num;
use crate::bitcoin::script::op::{encode_op_n, OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160};
use crate::bitcoin::{Hash160, PublicKey};
use crate::Result;
use bytes::Bytes;

/// ScriptBuilder assembles [Script]s.
///
/// Data pushes always use the smallest prefix that can carry them, and small integers
/// are pushed with the OP_N opcodes where possible.
#[derive(Default)]
pub struct ScriptBuilder {
    program: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    /// Append an opcode.
    pub fn op(mut self, opcode: u8) -> ScriptBuilder {
        self.program.push(opcode);
        self
    }

    /// Append a push of the given data.
    pub fn data(mut self, data: &[u8]) -> ScriptBuilder {
        write_push_data(&mut self.program, data);
        self
    }

    /// Append a push of the given number: OP_0/OP_1..OP_16/OP_1NEGATE where possible,
    /// otherwise the minimal number encoding.
    pub fn int(mut self, value: i64) -> ScriptBuilder {
        match encode_op_n(value) {
            Ok(opcode) => self.program.push(opcode),
            Err(_) if value == -1 => self.program.push(super::op::OP_1NEGATE),
            Err(_) => write_push_data(&mut self.program, &encode_script_num(value)),
        }
        self
    }

    /// Build the script.
    pub fn build(self) -> Result<Script> {
        Script::new(Bytes::from(self.program))
    }

    /// The standard pay-to-pubkey-hash output script:
    /// `DUP HASH160 <hash160> EQUALVERIFY CHECKSIG`.
    pub fn p2pkh_output(pubkey_hash: &Hash160) -> Result<Script> {
        ScriptBuilder::new()
            .op(OP_DUP)
            .op(OP_HASH160)
            .data(&pubkey_hash.hash)
            .op(OP_EQUALVERIFY)
            .op(OP_CHECKSIG)
            .build()
    }

    /// The pay-to-script-hash output script: `HASH160 <hash160(redeem)> EQUAL`.
    pub fn p2sh_output(script_hash: &Hash160) -> Result<Script> {
        ScriptBuilder::new()
            .op(OP_HASH160)
            .data(&script_hash.hash)
            .op(OP_EQUAL)
            .build()
    }

    /// A bare m-of-n multisig output script: `<m> <key>... <n> CHECKMULTISIG`.
    pub fn multisig_output(threshold: usize, pubkeys: &[PublicKey]) -> Result<Script> {
        if threshold == 0 || threshold > pubkeys.len() || pubkeys.len() > 16 {
            return Err(crate::Error::BadArgument(format!(
                "cannot build a {}-of-{} multisig script",
                threshold,
                pubkeys.len()
            )));
        }
        let mut builder = ScriptBuilder::new().int(threshold as i64);
        for pubkey in pubkeys {
            builder = builder.data(&pubkey.to_bytes());
        }
        builder.int(pubkeys.len() as i64).op(OP_CHECKMULTISIG).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::FromHex;
    use hex_literal::hex;

    #[test]
    fn build_p2pkh_output() {
        // from tx d2bb697e3555cb0e4a82f0d4990d1c826eee9f648a5efc598f648bdb524093ff output 0
        let hash = Hash160::from_hex("6f67988ec4b7bf498c9164d76b52dffdc805ff8c").unwrap();
        let script = ScriptBuilder::p2pkh_output(&hash).unwrap();
        assert_eq!(script.len(), 25);
        assert_eq!(
            script.raw().as_ref(),
            &hex!("76a9146f67988ec4b7bf498c9164d76b52dffdc805ff8c88ac")[..]
        );
    }

    #[test]
    fn p2sh_output_matches_template() {
        let hash = Hash160::generate(b"redeem");
        let script = ScriptBuilder::p2sh_output(&hash).unwrap();
        assert!(script.is_pay_to_script_hash());
    }

    #[test]
    fn int_uses_op_n_when_possible() {
        let script = ScriptBuilder::new().int(0).int(16).int(-1).int(17).build().unwrap();
        let raw = script.raw();
        assert_eq!(raw[0], super::super::op::OP_0);
        assert_eq!(raw[1], super::super::op::OP_16);
        assert_eq!(raw[2], super::super::op::OP_1NEGATE);
        // 17 needs a real push
        assert_eq!(raw[3], 1);
        assert_eq!(raw[4], 17);
    }

    #[test]
    fn multisig_output_shape() {
        let keys: Vec<PublicKey> = (0..3)
            .map(|_| PublicKey::from(&crate::bitcoin::PrivateKey::generate()))
            .collect();
        let script = ScriptBuilder::multisig_output(2, &keys).unwrap();
        let chunks = script.chunks();
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].opcode(), Some(super::super::op::OP_2));
        assert_eq!(chunks[4].opcode(), Some(super::super::op::OP_3));
        assert_eq!(chunks[5].opcode(), Some(OP_CHECKMULTISIG));

        assert!(ScriptBuilder::multisig_output(0, &keys).is_err());
        assert!(ScriptBuilder::multisig_output(4, &keys).is_err());
    }
}
