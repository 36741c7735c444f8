//! Shared fixtures for the integration tests: a regtest chain and a toy miner.

#![allow(dead_code)]

use bitcoinsv_core::bitcoin::pow::check_proof_of_work;
use bitcoinsv_core::bitcoin::{BlockHeader, BlockchainId, BlockchainParams, Hash};
use bitcoinsv_core::chain::{
    AlwaysValidRules, BlockChain, Executor, MemoryBlockStore, NewBestBlockListener,
    ReorganizeListener, StoredBlock,
};
use bitcoinsv_core::Result;
use std::sync::Mutex;

pub fn regtest_params() -> BlockchainParams {
    BlockchainParams::get_params(BlockchainId::Regtest)
}

pub fn new_chain() -> BlockChain<MemoryBlockStore> {
    let params = regtest_params();
    let store = MemoryBlockStore::new(&params);
    BlockChain::new(params, Box::new(AlwaysValidRules), store).unwrap()
}

/// Mine a child of `parent` at the regtest difficulty. `tag` makes the header unique
/// via the merkle root so sibling blocks differ.
pub fn mine_child(parent: &StoredBlock, tag: &str) -> StoredBlock {
    mine_child_with_bits(parent, tag, parent.header.bits)
}

/// Mine a child declaring the given compact target. Keep the target easy.
pub fn mine_child_with_bits(parent: &StoredBlock, tag: &str, bits: u32) -> StoredBlock {
    mine_header(
        parent,
        tag,
        bits,
        parent.header.timestamp + 600,
    )
}

/// Mine a child with an explicit timestamp, for exercising the timestamp rules.
pub fn mine_header(parent: &StoredBlock, tag: &str, bits: u32, timestamp: u32) -> StoredBlock {
    let params = regtest_params();
    let mut header = BlockHeader {
        version: 1,
        prev_hash: parent.hash(),
        merkle_root: Hash::sha256d(tag.as_bytes()),
        timestamp,
        bits,
        nonce: 0,
    };
    while check_proof_of_work(&header, &params.max_target).is_err() {
        header.nonce += 1;
    }
    StoredBlock::candidate(header, 1)
}

/// Records every new-best-block notification.
#[derive(Default)]
pub struct BlockRecorder {
    pub blocks: Mutex<Vec<StoredBlock>>,
}

impl NewBestBlockListener for BlockRecorder {
    fn notify_new_best_block(&self, block: &StoredBlock) -> Result<()> {
        self.blocks.lock().unwrap().push(block.clone());
        Ok(())
    }
}

impl BlockRecorder {
    pub fn heights(&self) -> Vec<u32> {
        self.blocks.lock().unwrap().iter().map(|b| b.height()).collect()
    }

    pub fn hashes(&self) -> Vec<bitcoinsv_core::bitcoin::BlockHash> {
        self.blocks.lock().unwrap().iter().map(|b| b.hash()).collect()
    }
}

/// Records every reorganize notification.
#[derive(Default)]
pub struct ReorgRecorder {
    pub events: Mutex<Vec<ReorgEvent>>,
}

pub struct ReorgEvent {
    pub split: StoredBlock,
    pub old_blocks: Vec<StoredBlock>,
    pub new_blocks: Vec<StoredBlock>,
}

impl ReorganizeListener for ReorgRecorder {
    fn reorganize(
        &self,
        split_point: &StoredBlock,
        old_blocks: &[StoredBlock],
        new_blocks: &[StoredBlock],
    ) -> Result<()> {
        self.events.lock().unwrap().push(ReorgEvent {
            split: split_point.clone(),
            old_blocks: old_blocks.to_vec(),
            new_blocks: new_blocks.to_vec(),
        });
        Ok(())
    }
}

/// An executor that runs tasks immediately but does not claim to be the inline
/// executor, so listener errors are swallowed rather than propagated.
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}
