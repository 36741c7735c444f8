use crate::{Error, Result};
use bytes::{Buf, BufMut};

/// Read & write Bitcoin data structures to and from binary in Bitcoin encoding format.
pub trait Encodable {
    /// Read the data structure from a buffer.
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self>
    where
        Self: Sized;

    /// Write the data structure to a buffer.
    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()>;

    /// Return the size of the encoded form.
    // Implementations must not encode the object just to count bytes; this is used to
    // size buffers before encoding.
    fn encoded_size(&self) -> u64;

    /// Read the data structure from a byte slice, requiring that the slice is fully consumed.
    fn from_binary_buf(buf: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        let mut b = buf;
        let v = Self::from_binary(&mut b)?;
        if b.has_remaining() {
            Err(Error::BadData("trailing bytes after decode".to_string()))
        } else {
            Ok(v)
        }
    }

    /// Write the data structure to a new byte vector.
    fn to_binary_buf(&self) -> Result<Vec<u8>> {
        let mut v = Vec::with_capacity(self.encoded_size() as usize);
        self.to_binary(&mut v)?;
        Ok(v)
    }
}

/// Decode a Bitcoin variable length integer from a buffer.
pub fn varint_decode(buffer: &mut dyn Buf) -> Result<u64> {
    let n = buffer.try_get_u8()?;
    Ok(match n {
        0xff => buffer.try_get_u64_le()?,
        0xfe => buffer.try_get_u32_le()? as u64,
        0xfd => buffer.try_get_u16_le()? as u64,
        _ => n as u64,
    })
}

/// Encode a Bitcoin variable length integer to a buffer.
pub fn varint_encode(buffer: &mut dyn BufMut, value: u64) -> Result<()> {
    if value <= 0xfc {
        buffer.put_u8(value as u8);
    } else if value <= 0xffff {
        buffer.put_u8(0xfd);
        buffer.put_u16_le(value as u16);
    } else if value <= 0xffffffff {
        buffer.put_u8(0xfe);
        buffer.put_u32_le(value as u32);
    } else {
        buffer.put_u8(0xff);
        buffer.put_u64_le(value);
    }
    Ok(())
}

/// The size in bytes of the varint encoding of the value.
pub fn varint_size(value: u64) -> u64 {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffffffff => 5,
        _ => 9,
    }
}
