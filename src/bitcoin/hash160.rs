use crate::{Error, Result};
use hex::{FromHex, ToHex};
use ring::digest::{digest, SHA256};
use ripemd::{Digest, Ripemd160};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 160-bit hash, specifically RIPEMD160(SHA256(data)).
///
/// This is the hash applied to public keys and redeem scripts; P2PKH and P2SH outputs
/// commit to one of these.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash160 {
    pub hash: [u8; Self::SIZE],
}

impl Hash160 {
    pub const SIZE: usize = 20;
    pub const HEX_SIZE: usize = Hash160::SIZE * 2;

    /// Generate the hash from the given data.
    pub fn generate(data: &[u8]) -> Hash160 {
        let sha256 = digest(&SHA256, data);
        let mut r = Ripemd160::new();
        Digest::update(&mut r, sha256.as_ref());
        let ripemd = r.finalize();
        let mut hash = [0; Self::SIZE];
        hash.clone_from_slice(ripemd.as_ref());
        Hash160 { hash }
    }

    pub fn from_slice(slice: &[u8]) -> Result<Hash160> {
        if slice.len() != Self::SIZE {
            return Err(Error::BadArgument(format!(
                "hash160 must be 20 bytes, got {}",
                slice.len()
            )));
        }
        let mut hash = [0; Self::SIZE];
        hash.copy_from_slice(slice);
        Ok(Hash160 { hash })
    }
}

impl FromHex for Hash160 {
    type Error = Error;

    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self> {
        let hex = hex.as_ref();
        if hex.len() != Self::HEX_SIZE {
            return Err(Error::BadArgument(format!(
                "hex encoded hash160 must be 40 characters, got {}",
                hex.len()
            )));
        }
        let bytes = hex::decode(hex)?;
        Hash160::from_slice(&bytes)
    }
}

impl ToHex for Hash160 {
    fn encode_hex<T: FromIterator<char>>(&self) -> T {
        hex::encode(self.hash).chars().collect()
    }

    fn encode_hex_upper<T: FromIterator<char>>(&self) -> T {
        hex::encode_upper(self.hash).chars().collect()
    }
}

impl From<[u8; 20]> for Hash160 {
    fn from(value: [u8; 20]) -> Self {
        Hash160 { hash: value }
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode_hex::<String>())
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode_hex::<String>())
    }
}

impl Serialize for Hash160 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.encode_hex::<String>().as_ref())
    }
}

impl<'de> Deserialize<'de> for Hash160 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
