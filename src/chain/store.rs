use crate::bitcoin::{BlockHash, BlockchainParams};
use crate::chain::block::StoredBlock;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps a map of block hashes to [StoredBlock]s and tracks the chain head.
///
/// The chain engine owns no block data itself; everything it links and reorganizes
/// lives behind this trait. Implementations must support concurrent readers; the
/// engine only writes while holding its chain lock.
pub trait BlockStore: Send + Sync {
    /// Fetch a block by hash, or None if this store has never seen it.
    fn get(&self, hash: &BlockHash) -> Result<Option<StoredBlock>>;

    /// Fetch the parent of the given block.
    fn prev(&self, block: &StoredBlock) -> Result<Option<StoredBlock>> {
        self.get(&block.header.prev_hash)
    }

    /// Persist a block. Must be durable before returning success.
    fn put(&self, block: &StoredBlock) -> Result<()>;

    /// The current chain head. A store is never empty; it is created with at least the
    /// genesis block.
    fn chain_head(&self) -> Result<StoredBlock>;

    /// Record a new chain head, committing any state the preceding puts built up.
    fn set_chain_head(&self, block: &StoredBlock) -> Result<()>;

    /// Called when a block failed verification after puts may have happened, so the
    /// store can abort whatever transaction it had open. The default does nothing.
    fn not_setting_chain_head(&self) -> Result<()> {
        Ok(())
    }

    /// Roll the store back so that the head is at the given height. Only SPV-style
    /// stores support this.
    fn rollback(&self, _height: u32) -> Result<()> {
        Err(Error::Unsupported("rollback"))
    }
}

/// An in-memory [BlockStore], seeded with the genesis block of its chain.
///
/// Suitable for tests and for header-tracking applications that rebuild state on
/// startup. Durability is trivially satisfied because there is nothing to flush.
pub struct MemoryBlockStore {
    inner: RwLock<Inner>,
}

struct Inner {
    blocks: HashMap<BlockHash, StoredBlock>,
    head: StoredBlock,
}

impl MemoryBlockStore {
    pub fn new(params: &BlockchainParams) -> MemoryBlockStore {
        let genesis = StoredBlock::genesis(params);
        let mut blocks = HashMap::new();
        blocks.insert(genesis.hash(), genesis.clone());
        MemoryBlockStore {
            inner: RwLock::new(Inner {
                blocks,
                head: genesis,
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))
    }
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, hash: &BlockHash) -> Result<Option<StoredBlock>> {
        Ok(self.read()?.blocks.get(hash).cloned())
    }

    fn put(&self, block: &StoredBlock) -> Result<()> {
        self.write()?.blocks.insert(block.hash(), block.clone());
        Ok(())
    }

    fn chain_head(&self) -> Result<StoredBlock> {
        Ok(self.read()?.head.clone())
    }

    fn set_chain_head(&self, block: &StoredBlock) -> Result<()> {
        self.write()?.head = block.clone();
        Ok(())
    }

    fn rollback(&self, height: u32) -> Result<()> {
        let mut inner = self.write()?;
        let mut cursor = inner.head.clone();
        if cursor.height() < height {
            return Err(Error::BadArgument(format!(
                "cannot roll back to height {} from {}",
                height,
                cursor.height()
            )));
        }
        while cursor.height() > height {
            cursor = inner
                .blocks
                .get(&cursor.header.prev_hash)
                .cloned()
                .ok_or_else(|| {
                    Error::StoreError("chain is not contiguous during rollback".to_string())
                })?;
        }
        inner.head = cursor;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::BlockchainId;

    fn store() -> MemoryBlockStore {
        MemoryBlockStore::new(&BlockchainParams::get_params(BlockchainId::Regtest))
    }

    fn child_of(parent: &StoredBlock, nonce: u32) -> StoredBlock {
        let mut header = parent.header.clone();
        header.prev_hash = parent.hash();
        header.nonce = nonce;
        parent
            .build_next(&StoredBlock::candidate(header, 1))
            .unwrap()
    }

    #[test]
    fn seeded_with_genesis() {
        let store = store();
        let head = store.chain_head().unwrap();
        assert_eq!(head.height(), 0);
        assert_eq!(store.get(&head.hash()).unwrap(), Some(head));
    }

    #[test]
    fn put_get_and_prev() {
        let store = store();
        let genesis = store.chain_head().unwrap();
        let child = child_of(&genesis, 7);
        store.put(&child).unwrap();
        store.set_chain_head(&child).unwrap();

        assert_eq!(store.chain_head().unwrap(), child);
        assert_eq!(store.prev(&child).unwrap(), Some(genesis));
        assert_eq!(store.get(&BlockHash::ZERO).unwrap(), None);
    }

    #[test]
    fn rollback_moves_head_back() {
        let store = store();
        let genesis = store.chain_head().unwrap();
        let b1 = child_of(&genesis, 1);
        store.put(&b1).unwrap();
        let b2 = child_of(&b1, 2);
        store.put(&b2).unwrap();
        store.set_chain_head(&b2).unwrap();

        store.rollback(1).unwrap();
        assert_eq!(store.chain_head().unwrap(), b1);
        // blocks above the rollback point are still fetchable
        assert_eq!(store.get(&b2.hash()).unwrap(), Some(b2));

        assert!(store.rollback(5).is_err());
    }
}
