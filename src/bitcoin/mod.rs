//! This module contains the bitcoin types and configuration for Bitcoin SV.

mod crypto;
mod encoding;
mod hash;
mod hash160;
mod header;
mod merkle;
pub mod params;
pub mod pow;
mod script;
mod tx;

pub use self::crypto::{PrivateKey, PublicKey};
pub use self::encoding::{varint_decode, varint_encode, varint_size, Encodable};
pub use self::hash::Hash;
pub use self::hash160::Hash160;
pub use self::header::{BlockHash, BlockHeader, MerkleRoot};
pub use self::merkle::{merkle_proof, merkle_root, verify_merkle_proof};
pub use self::params::{BlockchainId, BlockchainParams};
pub use self::script::*;
pub use self::tx::{Outpoint, Tx, TxHash, TxInput, TxOutput};

pub use hex::{FromHex, ToHex};
