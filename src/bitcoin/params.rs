use crate::bitcoin::pow::decode_compact_bits;
use crate::bitcoin::{BlockHash, BlockHeader, MerkleRoot};
use hex::FromHex;
use num::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bitcoin has multiple blockchains: "main", "test", "regtest", and "stn" chains.
///
/// In BitcoinSV we don't call these networks but blockchains. The P2P network is just a
/// mechanism for the applications to communicate, it does not define the blockchain. Its
/// the other way around, the blockchain defines the parameters used by the P2P network to
/// communicate.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainId {
    #[serde(alias = "mainnet")]
    Main = 0,
    #[serde(alias = "testnet")]
    Test = 1,
    Stn = 2,
    Regtest = 3,
}

/// Each blockchain has some different parameters.
#[derive(Clone, Debug)]
pub struct BlockchainParams {
    pub id: BlockchainId,
    /// The proof of work limit: no block may declare a target above this.
    pub max_target: BigUint,
    /// Number of recent blocks examined for version supermajority rules.
    pub majority_window: usize,
    /// How many blocks in the window make a version supermajority that rejects
    /// out-of-date blocks.
    pub majority_reject_block_outdated: usize,
    /// Known block hashes that the chain must pass through at given heights.
    checkpoints: HashMap<u32, BlockHash>,
}

impl BlockchainParams {
    /// Get the BlockchainParams for a specific blockchain.
    pub fn get_params(blockchain: BlockchainId) -> Self {
        match blockchain {
            BlockchainId::Main => BlockchainParams {
                id: blockchain,
                max_target: decode_compact_bits(0x1d00ffff).unwrap(),
                majority_window: 1000,
                majority_reject_block_outdated: 950,
                checkpoints: main_checkpoints(),
            },
            BlockchainId::Test | BlockchainId::Stn => BlockchainParams {
                id: blockchain,
                max_target: decode_compact_bits(0x1d00ffff).unwrap(),
                majority_window: 100,
                majority_reject_block_outdated: 75,
                checkpoints: HashMap::new(),
            },
            BlockchainId::Regtest => BlockchainParams {
                id: blockchain,
                max_target: decode_compact_bits(0x207fffff).unwrap(),
                majority_window: 100,
                majority_reject_block_outdated: 75,
                checkpoints: HashMap::new(),
            },
        }
    }

    /// The genesis block header for this blockchain.
    pub fn genesis_header(&self) -> BlockHeader {
        let merkle_root = MerkleRoot::from_hex(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
        )
        .unwrap();
        match self.id {
            BlockchainId::Main => BlockHeader {
                version: 1,
                prev_hash: BlockHash::ZERO,
                merkle_root,
                timestamp: 1231006505,
                bits: 0x1d00ffff,
                nonce: 2083236893,
            },
            BlockchainId::Test | BlockchainId::Stn => BlockHeader {
                version: 1,
                prev_hash: BlockHash::ZERO,
                merkle_root,
                timestamp: 1296688602,
                bits: 0x1d00ffff,
                nonce: 414098458,
            },
            BlockchainId::Regtest => BlockHeader {
                version: 1,
                prev_hash: BlockHash::ZERO,
                merkle_root,
                timestamp: 1296688602,
                bits: 0x207fffff,
                nonce: 2,
            },
        }
    }

    /// Returns true unless a checkpoint exists at the given height with a different hash.
    pub fn passes_checkpoint(&self, height: u32, hash: &BlockHash) -> bool {
        match self.checkpoints.get(&height) {
            Some(checkpoint) => checkpoint == hash,
            None => true,
        }
    }
}

// The classic fork-protection checkpoints shared by all Bitcoin variants, covering the
// 2010 value overflow incident and the BIP30 duplicate coinbases.
fn main_checkpoints() -> HashMap<u32, BlockHash> {
    [
        (
            91722,
            "00000000000271a2dc26e7667f8419f2e15416dc6955e5a6c6cdf3f2574dd08e",
        ),
        (
            91812,
            "00000000000af0aed4792b1acee3d966af36cf5def14935db8de83d6f9306f2f",
        ),
        (
            91842,
            "00000000000a4d0a398161ffc163c503763b1f4360639393e0e4c8e300e0caec",
        ),
        (
            91880,
            "00000000000743f190a18c5577a3c2d2a1f610ae9601ac046a38084ccb7cd721",
        ),
        (
            200000,
            "000000000000034a7dedef4a161fa058a2d67a173a90155f3a2fe6fc132e0ebf",
        ),
    ]
    .into_iter()
    .map(|(height, hash)| (height, BlockHash::from_hex(hash).unwrap()))
    .collect()
}
