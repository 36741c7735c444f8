use crate::bitcoin::Encodable;
use crate::{Error, Result};
use bytes::{Buf, BufMut};
use hex::{FromHex, ToHex};
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A SHA256d (double SHA-256) hash.
///
/// This is the identity hash used throughout Bitcoin for blocks, transactions, and merkle
/// nodes. The bytes are kept in wire order; the hex form is byte-reversed in accordance
/// with the Bitcoin display convention.
///
/// [BlockHash], [TxHash] and [MerkleRoot] are type aliases for this struct and should be
/// preferred where the meaning is known.
///
/// [BlockHash]: crate::bitcoin::BlockHash
/// [TxHash]: crate::bitcoin::TxHash
/// [MerkleRoot]: crate::bitcoin::MerkleRoot
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash {
    pub raw: [u8; 32],
}

impl Hash {
    pub const SIZE: u64 = 32;
    pub const HEX_SIZE: u64 = Hash::SIZE * 2;
    pub const ZERO: Hash = Hash {
        raw: [0; Self::SIZE as usize],
    };

    /// Double SHA256 hash the given data.
    pub fn sha256d(data: &[u8]) -> Hash {
        let sha256 = digest(&SHA256, data);
        let sha256d = digest(&SHA256, sha256.as_ref());
        let mut raw = [0; 32];
        raw.clone_from_slice(sha256d.as_ref());
        Hash { raw }
    }

    pub fn from_slice(slice: &[u8]) -> Result<Hash> {
        if slice.len() != Self::SIZE as usize {
            return Err(Error::BadArgument(format!(
                "hash must be 32 bytes, got {}",
                slice.len()
            )));
        }
        let mut raw = [0; 32];
        raw.copy_from_slice(slice);
        Ok(Hash { raw })
    }

    fn generic_encode_hex<T, F>(&self, mut encode_fn: F) -> T
    where
        T: FromIterator<char>,
        F: FnMut(&[u8]) -> String,
    {
        let mut reversed = self.raw;
        reversed.reverse();
        encode_fn(&reversed).chars().collect()
    }
}

impl Encodable for Hash {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        if buffer.remaining() < Self::SIZE as usize {
            return Err(Error::DataTooSmall);
        }
        let mut raw = [0; 32];
        buffer.copy_to_slice(&mut raw);
        Ok(Hash { raw })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        buffer.put_slice(&self.raw);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        Self::SIZE
    }
}

impl FromHex for Hash {
    type Error = Error;

    /// Converts a string of 64 hex characters into a hash. The bytes are reversed in
    /// accordance with the Bitcoin display convention.
    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self> {
        let hex = hex.as_ref();
        if hex.len() != Hash::HEX_SIZE as usize {
            return Err(Error::BadArgument(format!(
                "hex encoded hash must be 64 characters, got {}",
                hex.len()
            )));
        }
        let mut bytes = hex::decode(hex)?;
        bytes.reverse();
        Hash::from_slice(&bytes)
    }
}

impl ToHex for Hash {
    fn encode_hex<T: FromIterator<char>>(&self) -> T {
        self.generic_encode_hex(|b: &[u8]| hex::encode(b))
    }

    fn encode_hex_upper<T: FromIterator<char>>(&self) -> T {
        self.generic_encode_hex(|b: &[u8]| hex::encode_upper(b))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(value: [u8; 32]) -> Self {
        Hash { raw: value }
    }
}

impl From<Hash> for [u8; 32] {
    fn from(value: Hash) -> Self {
        value.raw
    }
}

impl Ord for Hash {
    /// Hashes order by their hex representation, which is byte-wise from the last byte
    /// of the wire encoding to the first.
    fn cmp(&self, other: &Hash) -> Ordering {
        for i in (0..32).rev() {
            match self.raw[i].cmp(&other.raw[i]) {
                Ordering::Equal => continue,
                o => return o,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Hash) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode_hex::<String>())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode_hex::<String>())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.encode_hex::<String>().as_ref())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_vector() {
        let x = hex::decode("0123456789abcdef").unwrap();
        let e = hex::encode(Hash::sha256d(&x).raw);
        assert_eq!(
            e,
            "137ad663f79da06e282ed0abbec4d70523ced5ff8e39d5c2e5641d978c5925aa"
        );
    }

    #[test]
    fn hex_round_trip_is_reversed() {
        let s = "00000000000000000328503edec3569a36f5b11cdcfbb3f6c5efe39cf1cafad8";
        let h = Hash::from_hex(s).unwrap();
        // wire order has the leading zeros of the display form at the end
        assert_eq!(h.raw[31], 0x00);
        assert_eq!(h.raw[0], 0xd8);
        assert_eq!(h.encode_hex::<String>(), s);
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert!(Hash::from_hex("00").is_err());
        let too_long = "0".repeat(66);
        assert!(Hash::from_hex(too_long).is_err());
        let bad_char = format!("{}g", "0".repeat(63));
        assert!(Hash::from_hex(bad_char).is_err());
    }

    #[test]
    fn ordering_matches_hex_representation() {
        let a = Hash::from_hex("0555555555555555555555555555555555555555555555555555555555555555")
            .unwrap();
        let b = Hash::from_hex("5555555555555555555555555555555555555555555555555555555555555555")
            .unwrap();
        let c = Hash::from_hex("5555555555555555555555555555555555555555555555555555555555555556")
            .unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn binary_round_trip() {
        let h = Hash::sha256d(b"round trip");
        let buf = h.to_binary_buf().unwrap();
        assert_eq!(buf.len(), 32);
        assert_eq!(Hash::from_binary_buf(&buf).unwrap(), h);
    }

    #[test]
    fn json_round_trip() {
        let h = Hash::sha256d(b"hello world");
        let serialized = serde_json::to_string(&h).unwrap();
        let deserialized: Hash = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, h);
    }
}
