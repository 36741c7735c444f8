use crate::bitcoin::pow::work_from_compact_bits;
use crate::bitcoin::{BlockHash, BlockHeader, BlockchainParams, Encodable};
use crate::{Error, Result};
use bytes::{Buf, BufMut};
use num::BigUint;

/// Per-block data carried alongside the header: facts about the block itself rather
/// than its place in the chain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    /// Number of transactions in the block.
    pub tx_count: u32,
    /// Serialized size of the full block in bytes.
    pub block_size: u32,
}

impl BlockMeta {
    pub const SIZE: u64 = 8;
}

impl Encodable for BlockMeta {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        Ok(BlockMeta {
            tx_count: buffer.try_get_u32_le()?,
            block_size: buffer.try_get_u32_le()?,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        buffer.put_u32_le(self.tx_count);
        buffer.put_u32_le(self.block_size);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        Self::SIZE
    }
}

/// Cumulative facts about a block's position in the chain, derived from its ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    /// Total work of the chain up to and including this block.
    pub chain_work: BigUint,
    /// Distance from the genesis block, which is at height 0.
    pub height: u32,
    /// Total number of transactions in the chain up to and including this block.
    pub total_chain_txs: i64,
}

impl ChainInfo {
    /// Serialized size: 32 bytes of chain work, u32 height, i64 transaction count.
    pub const SIZE: u64 = 44;
    const CHAIN_WORK_BYTES: usize = 32;
}

impl Encodable for ChainInfo {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        if buffer.remaining() < Self::CHAIN_WORK_BYTES {
            return Err(Error::DataTooSmall);
        }
        let mut work = [0u8; Self::CHAIN_WORK_BYTES];
        buffer.copy_to_slice(&mut work);
        Ok(ChainInfo {
            chain_work: BigUint::from_bytes_be(&work),
            height: buffer.try_get_u32_le()?,
            total_chain_txs: buffer.try_get_i64_le()?,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        let work = self.chain_work.to_bytes_be();
        if work.len() > Self::CHAIN_WORK_BYTES {
            return Err(Error::BadData(
                "chain work does not fit in 32 bytes".to_string(),
            ));
        }
        // chain work is written big-endian, padded on the right to fixed width
        buffer.put_slice(&work);
        buffer.put_bytes(0, Self::CHAIN_WORK_BYTES - work.len());
        buffer.put_u32_le(self.height);
        buffer.put_i64_le(self.total_chain_txs);
        Ok(())
    }

    fn encoded_size(&self) -> u64 {
        Self::SIZE
    }
}

/// A block header with the metadata needed to place it in the chain: the record the
/// chain engine links, compares, and hands to the block store.
///
/// StoredBlocks are immutable once placed in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlock {
    pub header: BlockHeader,
    pub block_meta: BlockMeta,
    pub chain_info: ChainInfo,
}

impl StoredBlock {
    /// Fixed serialized size: header, block meta, chain info.
    pub const SIZE: u64 = BlockHeader::SIZE as u64 + BlockMeta::SIZE + ChainInfo::SIZE;

    /// Wrap a header received from the network as a candidate for the chain. The chain
    /// info is provisional; the engine derives the real values from the parent when the
    /// block connects.
    pub fn candidate(header: BlockHeader, tx_count: u32) -> StoredBlock {
        StoredBlock {
            header,
            block_meta: BlockMeta {
                tx_count,
                block_size: 0,
            },
            chain_info: ChainInfo {
                chain_work: BigUint::default(),
                height: 0,
                total_chain_txs: 0,
            },
        }
    }

    /// The genesis block of the given blockchain, at height 0 with its own work.
    pub fn genesis(params: &BlockchainParams) -> StoredBlock {
        let header = params.genesis_header();
        let chain_work = work_from_compact_bits(header.bits)
            .expect("genesis difficulty bits are valid");
        StoredBlock {
            header,
            block_meta: BlockMeta {
                tx_count: 1,
                block_size: 0,
            },
            chain_info: ChainInfo {
                chain_work,
                height: 0,
                total_chain_txs: 1,
            },
        }
    }

    /// Build the stored form of `candidate` as the next block after `self`, carrying
    /// the cumulative work, height, and transaction totals forward.
    pub fn build_next(&self, candidate: &StoredBlock) -> Result<StoredBlock> {
        let work = work_from_compact_bits(candidate.header.bits)?;
        Ok(StoredBlock {
            header: candidate.header.clone(),
            block_meta: candidate.block_meta,
            chain_info: ChainInfo {
                chain_work: &self.chain_info.chain_work + work,
                height: self.chain_info.height + 1,
                total_chain_txs: self.chain_info.total_chain_txs
                    + candidate.block_meta.tx_count as i64,
            },
        })
    }

    /// The identity of the block.
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn height(&self) -> u32 {
        self.chain_info.height
    }

    pub fn chain_work(&self) -> &BigUint {
        &self.chain_info.chain_work
    }

    /// Strictly more cumulative work than the other block. Ties never reorganize.
    pub fn more_work_than(&self, other: &StoredBlock) -> bool {
        self.chain_info.chain_work > other.chain_info.chain_work
    }
}

impl Encodable for StoredBlock {
    fn from_binary(buffer: &mut dyn Buf) -> Result<Self> {
        Ok(StoredBlock {
            header: BlockHeader::from_binary(buffer)?,
            block_meta: BlockMeta::from_binary(buffer)?,
            chain_info: ChainInfo::from_binary(buffer)?,
        })
    }

    fn to_binary(&self, buffer: &mut dyn BufMut) -> Result<()> {
        self.header.to_binary(buffer)?;
        self.block_meta.to_binary(buffer)?;
        self.chain_info.to_binary(buffer)
    }

    fn encoded_size(&self) -> u64 {
        Self::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::BlockchainId;

    fn genesis() -> StoredBlock {
        StoredBlock::genesis(&BlockchainParams::get_params(BlockchainId::Regtest))
    }

    #[test]
    fn chain_info_layout() {
        let info = ChainInfo {
            chain_work: BigUint::from(0x0102u32),
            height: 7,
            total_chain_txs: 9,
        };
        let buf = info.to_binary_buf().unwrap();
        assert_eq!(buf.len() as u64, ChainInfo::SIZE);
        // work is big-endian and right-padded
        assert_eq!(&buf[..2], &[0x01, 0x02]);
        assert!(buf[2..32].iter().all(|&b| b == 0));
        assert_eq!(&buf[32..36], &[7, 0, 0, 0]);
        assert_eq!(&buf[36..44], &[9, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn stored_block_round_trip() {
        let genesis = genesis();
        let buf = genesis.to_binary_buf().unwrap();
        assert_eq!(buf.len() as u64, StoredBlock::SIZE);
        let decoded = StoredBlock::from_binary_buf(&buf).unwrap();
        assert_eq!(decoded.header, genesis.header);
        assert_eq!(decoded.block_meta, genesis.block_meta);
        assert_eq!(decoded.chain_info.height, 0);
        assert_eq!(decoded.chain_info.total_chain_txs, 1);
    }

    #[test]
    fn build_next_accumulates() {
        let genesis = genesis();
        let mut header = genesis.header.clone();
        header.prev_hash = genesis.hash();
        let candidate = StoredBlock::candidate(header, 5);

        let next = genesis.build_next(&candidate).unwrap();
        assert_eq!(next.height(), 1);
        assert_eq!(next.chain_info.total_chain_txs, 6);
        assert_eq!(
            next.chain_info.chain_work,
            &genesis.chain_info.chain_work
                + work_from_compact_bits(next.header.bits).unwrap()
        );
        assert!(next.more_work_than(&genesis));
        assert!(!genesis.more_work_than(&genesis));
    }
}
