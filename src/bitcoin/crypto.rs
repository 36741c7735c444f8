use crate::bitcoin::hash160::Hash160;
use crate::Result;
use secp256k1::Secp256k1;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A Bitcoin private key.
///
/// This is a wrapper around [secp256k1::SecretKey], providing some Bitcoin specific
/// functionality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    /// The actual ECDSA key.
    pub inner: secp256k1::SecretKey,
}

impl PrivateKey {
    /// Constructs a new ECDSA private key using the secp256k1 algorithm and a secure
    /// random number generator.
    pub fn generate() -> PrivateKey {
        let secret_key = secp256k1::SecretKey::new(&mut rand::rng());
        PrivateKey::new(secret_key)
    }

    /// Constructs private key from the provided generic Secp256k1 private key.
    pub fn new(key: secp256k1::SecretKey) -> PrivateKey {
        PrivateKey { inner: key }
    }

    /// Serializes the private key to bytes.
    pub fn to_bytes(self) -> Vec<u8> {
        self.inner[..].to_vec()
    }

    /// Deserializes a private key from a slice.
    pub fn from_slice(data: &[u8]) -> Result<PrivateKey> {
        Ok(PrivateKey::new(secp256k1::SecretKey::from_byte_array(
            data.try_into()
                .map_err(|_| crate::Error::BadArgument("private key must be 32 bytes".to_string()))?,
        )?))
    }
}

/// A Bitcoin ECDSA public key.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PublicKey {
    /// The actual ECDSA key.
    pub inner: secp256k1::PublicKey,
}

impl PublicKey {
    /// Constructs a compressed ECDSA public key from anything that can be converted into
    /// a Secp256k1 public key.
    pub fn new(key: impl Into<secp256k1::PublicKey>) -> PublicKey {
        PublicKey { inner: key.into() }
    }

    /// Returns the bitcoin 160-bit hash of the public key, as committed to by P2PKH
    /// output scripts.
    pub fn pubkey_hash(&self) -> Hash160 {
        Hash160::generate(&self.inner.serialize())
    }

    /// Serializes the public key to its compressed 33 byte form.
    pub fn to_bytes(self) -> Vec<u8> {
        self.inner.serialize().to_vec()
    }
}

impl From<secp256k1::PublicKey> for PublicKey {
    fn from(pk: secp256k1::PublicKey) -> PublicKey {
        PublicKey::new(pk)
    }
}

impl From<&PrivateKey> for PublicKey {
    fn from(value: &PrivateKey) -> Self {
        let secp = Secp256k1::new();
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(&secp, &value.inner),
        }
    }
}

impl FromStr for PublicKey {
    type Err = crate::Error;

    /// Decode a public key from the hex representation as included in a script and used
    /// by OP_CHECKSIG (e.g. from a P2PKH output script).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(PublicKey {
            inner: secp256k1::PublicKey::from_str(s)?,
        })
    }
}
