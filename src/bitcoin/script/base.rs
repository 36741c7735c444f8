use crate::bitcoin::script::op::{self, op_name};
use crate::{Error, Result};
use bytes::{Buf, Bytes};
use hex::FromHex;
use std::fmt;

/// One parsed element of a script: an opcode, or a literal push of data.
///
/// Each chunk records the byte offset at which it starts in the program, which
/// OP_CODESEPARATOR needs to compute the signed subscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptChunk {
    /// A logical opcode.
    Op { opcode: u8, start: usize },
    /// A literal push; `data` excludes the push prefix bytes.
    Push { data: Bytes, start: usize },
}

impl ScriptChunk {
    /// The offset of the first byte of this chunk in the program.
    pub fn start(&self) -> usize {
        match self {
            ScriptChunk::Op { start, .. } => *start,
            ScriptChunk::Push { start, .. } => *start,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, ScriptChunk::Push { .. })
    }

    /// The opcode value, if this chunk is an opcode.
    pub fn opcode(&self) -> Option<u8> {
        match self {
            ScriptChunk::Op { opcode, .. } => Some(*opcode),
            ScriptChunk::Push { .. } => None,
        }
    }
}

/// Bitcoin Scripts are used to lock and unlock outputs.
///
/// A Script owns its encoded program and the chunk sequence parsed from it. Parsing
/// happens on construction; a program whose push prefixes run past the end of the
/// buffer does not construct. Use [ScriptBuilder](crate::bitcoin::ScriptBuilder) to
/// assemble scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    raw: Bytes,
    chunks: Vec<ScriptChunk>,
}

impl Script {
    /// Parse a program into a Script.
    pub fn new(raw: Bytes) -> Result<Script> {
        let chunks = parse(&raw)?;
        Ok(Script { raw, chunks })
    }

    /// The raw program bytes.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The parsed chunk sequence.
    pub fn chunks(&self) -> &[ScriptChunk] {
        &self.chunks
    }

    /// Program length in bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether this program is a pay-to-script-hash output exactly matching the template
    /// `OP_HASH160 <20 bytes> OP_EQUAL`. The match is over the raw bytes, as the rule is
    /// defined on the serialized form.
    pub fn is_pay_to_script_hash(&self) -> bool {
        self.raw.len() == 23
            && self.raw[0] == op::OP_HASH160
            && self.raw[1] == 0x14
            && self.raw[22] == op::OP_EQUAL
    }

    /// Whether every chunk of this script is a push (no opcode above OP_16). Required of
    /// the scriptSig when spending a P2SH output.
    pub fn is_push_only(&self) -> bool {
        self.chunks.iter().all(|c| match c {
            ScriptChunk::Push { .. } => true,
            ScriptChunk::Op { opcode, .. } => *opcode <= op::OP_16,
        })
    }
}

impl From<Vec<u8>> for Script {
    /// Wrap raw bytes without requiring them to parse; chunks are empty if parsing fails.
    /// Prefer [Script::new] where a parse failure must be surfaced.
    fn from(value: Vec<u8>) -> Self {
        let raw = Bytes::from(value);
        let chunks = parse(&raw).unwrap_or_default();
        Script { raw, chunks }
    }
}

impl FromHex for Script {
    type Error = Error;

    /// Hex encoding is not prefixed by the length.
    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self> {
        let raw = hex::decode(hex)?;
        Script::new(Bytes::from(raw))
    }
}

impl fmt::Display for Script {
    /// Renders the program as opcode names and bracketed hex data, e.g. "DUP HASH160 [1234] ...".
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for chunk in &self.chunks {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match chunk {
                ScriptChunk::Op { opcode, .. } => write!(f, "{}", op_name(*opcode))?,
                ScriptChunk::Push { data, .. } => write!(f, "[{}]", hex::encode(data))?,
            }
        }
        Ok(())
    }
}

/// Split a program into chunks. Push opcodes consume their data; every other byte is an
/// opcode chunk. PUSHDATA lengths are little-endian with four distinct bytes for
/// OP_PUSHDATA4.
fn parse(raw: &Bytes) -> Result<Vec<ScriptChunk>> {
    let mut chunks = Vec::with_capacity(10);
    let mut buf = raw.clone();
    let total = raw.len();
    while buf.has_remaining() {
        let start = total - buf.remaining();
        let opcode = buf.get_u8();
        match opcode {
            0x00..=0x4b => {
                chunks.push(ScriptChunk::Push {
                    data: read_push_data(&mut buf, opcode as usize)?,
                    start,
                });
            }
            op::OP_PUSHDATA1 => {
                let len = buf.try_get_u8()? as usize;
                chunks.push(ScriptChunk::Push {
                    data: read_push_data(&mut buf, len)?,
                    start,
                });
            }
            op::OP_PUSHDATA2 => {
                let len = buf.try_get_u16_le()? as usize;
                chunks.push(ScriptChunk::Push {
                    data: read_push_data(&mut buf, len)?,
                    start,
                });
            }
            op::OP_PUSHDATA4 => {
                let len = buf.try_get_u32_le()? as usize;
                chunks.push(ScriptChunk::Push {
                    data: read_push_data(&mut buf, len)?,
                    start,
                });
            }
            _ => chunks.push(ScriptChunk::Op { opcode, start }),
        }
    }
    Ok(chunks)
}

fn read_push_data(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    if buf.remaining() < len {
        return Err(Error::BadData(format!(
            "push of {} bytes runs past the end of the script",
            len
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

/// Serialize a data push with the smallest prefix that can carry it.
pub fn encode_push_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    write_push_data(&mut out, data);
    out
}

/// Append a data push with the smallest prefix that can carry it.
pub fn write_push_data(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < op::OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(op::OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(op::OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(op::OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

/// Returns `script` with every occurrence of the byte sequence `pattern` removed, where
/// occurrences are only recognized at chunk boundaries. Used by the signature opcodes to
/// delete signature pushes from the subscript before hashing.
pub fn remove_all_instances_of(script: &[u8], pattern: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(script.len());
    let mut cursor = 0;
    while cursor < script.len() {
        let skip = !pattern.is_empty()
            && script.len() - cursor >= pattern.len()
            && &script[cursor..cursor + pattern.len()] == pattern;

        let opcode = script[cursor];
        let chunk_start = cursor;
        cursor += 1;
        // length of the chunk body following the opcode byte; a truncated push just
        // consumes what remains, matching the lenient reference behavior
        let body = match opcode {
            0x01..=0x4b => opcode as usize,
            op::OP_PUSHDATA1 => {
                if cursor < script.len() {
                    1 + script[cursor] as usize
                } else {
                    0
                }
            }
            op::OP_PUSHDATA2 => {
                if cursor + 1 < script.len() {
                    2 + u16::from_le_bytes([script[cursor], script[cursor + 1]]) as usize
                } else {
                    script.len() - cursor
                }
            }
            op::OP_PUSHDATA4 => {
                if cursor + 3 < script.len() {
                    4 + u32::from_le_bytes([
                        script[cursor],
                        script[cursor + 1],
                        script[cursor + 2],
                        script[cursor + 3],
                    ]) as usize
                } else {
                    script.len() - cursor
                }
            }
            _ => 0,
        };
        let end = (cursor + body).min(script.len());
        if !skip {
            out.extend_from_slice(&script[chunk_start..end]);
        }
        cursor = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// This script comes from input 0 of tx
    /// 60dcda63c57420077d67e3ae6684a1654cf9f9cc1b8edd569a847f2b5109b739.
    #[test]
    fn parse_real_script_sig() {
        let s = Script::from_hex("47304402207df65c96172de240e6232daeeeccccf8655cb4aba38d968f784e34c6cc047cd30220078216eefaddb915ce55170348c3363d013693c543517ad59188901a0e7f8e50412103be56e90fb443f554140e8d260d7214c3b330cfb7da83b3dd5624f85578497841").unwrap();
        assert_eq!(s.len(), 106);
        assert_eq!(s.chunks().len(), 2);
        assert!(s.chunks()[0].is_push());
        assert!(s.chunks()[1].is_push());
        assert_eq!(s.chunks()[0].start(), 0);
        assert_eq!(s.chunks()[1].start(), 0x48);
        assert!(s.is_push_only());
    }

    #[test]
    fn parse_pushdata_forms() {
        // direct, PUSHDATA1, PUSHDATA2 all pushing [0xaa]
        let s = Script::new(Bytes::from(
            &hex!("01aa" "4c01bb" "4d0100cc")[..],
        ))
        .unwrap();
        let data: Vec<&[u8]> = s
            .chunks()
            .iter()
            .map(|c| match c {
                ScriptChunk::Push { data, .. } => data.as_ref(),
                _ => panic!("expected push"),
            })
            .collect();
        assert_eq!(data, vec![&[0xaa][..], &[0xbb][..], &[0xcc][..]]);
    }

    #[test]
    fn parse_pushdata4_reads_four_length_bytes() {
        let mut raw = vec![op::OP_PUSHDATA4, 0x03, 0x00, 0x00, 0x00];
        raw.extend_from_slice(&[1, 2, 3]);
        let s = Script::new(Bytes::from(raw)).unwrap();
        assert_eq!(s.chunks().len(), 1);
        match &s.chunks()[0] {
            ScriptChunk::Push { data, .. } => assert_eq!(data.as_ref(), &[1, 2, 3]),
            _ => panic!("expected push"),
        }
    }

    #[test]
    fn parse_truncated_push_fails() {
        assert!(Script::new(Bytes::from_static(&[0x05, 1, 2])).is_err());
        assert!(Script::new(Bytes::from_static(&[op::OP_PUSHDATA1])).is_err());
        assert!(Script::new(Bytes::from_static(&[op::OP_PUSHDATA2, 0x10])).is_err());
    }

    #[test]
    fn op_0_pushes_empty() {
        let s = Script::new(Bytes::from_static(&[op::OP_0])).unwrap();
        match &s.chunks()[0] {
            ScriptChunk::Push { data, .. } => assert!(data.is_empty()),
            _ => panic!("OP_0 must parse as an empty push"),
        }
    }

    #[test]
    fn p2sh_template_detection() {
        let mut raw = vec![op::OP_HASH160, 0x14];
        raw.extend_from_slice(&[0u8; 20]);
        raw.push(op::OP_EQUAL);
        assert!(Script::new(Bytes::from(raw.clone())).unwrap().is_pay_to_script_hash());

        // one extra byte breaks the template
        raw.push(op::OP_NOP);
        assert!(!Script::new(Bytes::from(raw)).unwrap().is_pay_to_script_hash());
    }

    #[test]
    fn push_only_detection() {
        let s = Script::new(Bytes::from_static(&[op::OP_0, 0x01, 0xaa, op::OP_16])).unwrap();
        assert!(s.is_push_only());
        let s = Script::new(Bytes::from_static(&[0x01, 0xaa, op::OP_DUP])).unwrap();
        assert!(!s.is_push_only());
    }

    #[test]
    fn display_renders_names_and_data() {
        let s = Script::new(Bytes::from_static(&[
            op::OP_DUP,
            op::OP_HASH160,
            0x02,
            0xab,
            0xcd,
            op::OP_EQUALVERIFY,
            op::OP_CHECKSIG,
        ]))
        .unwrap();
        assert_eq!(s.to_string(), "DUP HASH160 [abcd] EQUALVERIFY CHECKSIG");
    }

    #[test]
    fn encode_push_data_prefixes() {
        assert_eq!(encode_push_data(&[0xaa])[0], 1);
        let push75 = encode_push_data(&[0u8; 75]);
        assert_eq!(push75[0], 75);
        let push76 = encode_push_data(&[0u8; 76]);
        assert_eq!(&push76[..2], &[op::OP_PUSHDATA1, 76]);
        let push300 = encode_push_data(&[0u8; 300]);
        assert_eq!(&push300[..3], &[op::OP_PUSHDATA2, 0x2c, 0x01]);
    }

    #[test]
    fn remove_signature_push() {
        let sig = [0x30u8, 0x44, 0x02, 0x20, 0x7d];
        let pubkey = [0x03u8, 0xbe, 0x56];
        let mut script = Vec::new();
        write_push_data(&mut script, &sig);
        write_push_data(&mut script, &pubkey);

        let removed = remove_all_instances_of(&script, &encode_push_data(&sig));
        assert_eq!(removed, encode_push_data(&pubkey));

        // a pattern that does not sit on a chunk boundary is not removed
        let not_removed = remove_all_instances_of(&script, &sig);
        assert_eq!(not_removed, script);
    }

    #[test]
    fn remove_opcode_instances() {
        let script = vec![op::OP_CODESEPARATOR, op::OP_DUP, op::OP_CODESEPARATOR];
        let removed = remove_all_instances_of(&script, &[op::OP_CODESEPARATOR]);
        assert_eq!(removed, vec![op::OP_DUP]);
    }
}
