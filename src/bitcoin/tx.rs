use crate::bitcoin::hash::Hash;
use crate::bitcoin::{varint_decode, varint_encode, varint_size, Encodable};
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes};
use hex::{FromHex, ToHex};

/// The TxHash is used to identify transactions.
pub type TxHash = Hash;

/// A reference to an output of a previous transaction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Outpoint {
    /// Hash of the transaction that created the output.
    pub tx_hash: TxHash,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl Encodable for Outpoint {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        Ok(Outpoint {
            tx_hash: Hash::from_binary(buffer)?,
            index: buffer.try_get_u32_le()?,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        self.tx_hash.to_binary(buffer)?;
        buffer.put_u32_le(self.index);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        36
    }
}

/// An input of a transaction, spending a previous output.
///
/// The unlocking script is kept as raw bytes; scripts are only parsed when they are
/// evaluated, since a confirmed transaction may carry a script that does not parse.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct TxInput {
    pub outpoint: Outpoint,
    /// The unlocking script (scriptSig), raw.
    pub script: Bytes,
    pub sequence: u32,
}

impl Encodable for TxInput {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        let outpoint = Outpoint::from_binary(buffer)?;
        let script = read_script(buffer)?;
        let sequence = buffer.try_get_u32_le()?;
        Ok(TxInput {
            outpoint,
            script,
            sequence,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        self.outpoint.to_binary(buffer)?;
        write_script(buffer, &self.script)?;
        buffer.put_u32_le(self.sequence);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        36 + varint_size(self.script.len() as u64) + self.script.len() as u64 + 4
    }
}

/// An output of a transaction.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct TxOutput {
    /// Value of the output in satoshis.
    pub value: u64,
    /// The locking script (scriptPubKey), raw.
    pub script: Bytes,
}

impl Encodable for TxOutput {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        let value = buffer.try_get_u64_le()?;
        let script = read_script(buffer)?;
        Ok(TxOutput { value, script })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        buffer.put_u64_le(self.value);
        write_script(buffer, &self.script)
    }

    fn encoded_size(&self) -> u64 {
        8 + varint_size(self.script.len() as u64) + self.script.len() as u64
    }
}

/// A Bitcoin transaction.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Tx {
    /// Transaction version number.
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Earliest time or block height at which the transaction may be mined.
    pub lock_time: u32,
}

impl Tx {
    /// The identity hash of the transaction.
    pub fn hash(&self) -> TxHash {
        let v = self.to_binary_buf().expect("tx encoding is infallible");
        Hash::sha256d(&v)
    }
}

impl Encodable for Tx {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        let version = buffer.try_get_u32_le()?;
        let input_count = varint_decode(buffer)?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            inputs.push(TxInput::from_binary(buffer)?);
        }
        let output_count = varint_decode(buffer)?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            outputs.push(TxOutput::from_binary(buffer)?);
        }
        let lock_time = buffer.try_get_u32_le()?;
        Ok(Tx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        buffer.put_u32_le(self.version);
        varint_encode(buffer, self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.to_binary(buffer)?;
        }
        varint_encode(buffer, self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.to_binary(buffer)?;
        }
        buffer.put_u32_le(self.lock_time);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        4 + varint_size(self.inputs.len() as u64)
            + self.inputs.iter().map(|i| i.encoded_size()).sum::<u64>()
            + varint_size(self.outputs.len() as u64)
            + self.outputs.iter().map(|o| o.encoded_size()).sum::<u64>()
            + 4
    }
}

impl FromHex for Tx {
    type Error = Error;

    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self> {
        let bytes = hex::decode(hex)?;
        Tx::from_binary_buf(bytes.as_slice())
    }
}

impl ToHex for Tx {
    fn encode_hex<T: FromIterator<char>>(&self) -> T {
        let bytes = self.to_binary_buf().expect("tx encoding is infallible");
        bytes.encode_hex()
    }

    fn encode_hex_upper<T: FromIterator<char>>(&self) -> T {
        let bytes = self.to_binary_buf().expect("tx encoding is infallible");
        bytes.encode_hex_upper()
    }
}

fn read_script(buffer: &mut dyn Buf) -> Result<Bytes> {
    let len = varint_decode(buffer)? as usize;
    if buffer.remaining() < len {
        return Err(Error::DataTooSmall);
    }
    Ok(buffer.copy_to_bytes(len))
}

fn write_script(buffer: &mut dyn BufMut, script: &Bytes) -> Result<()> {
    varint_encode(buffer, script.len() as u64)?;
    buffer.put_slice(script);
    Ok(())
}
