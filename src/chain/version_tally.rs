use crate::chain::block::StoredBlock;
use crate::chain::store::BlockStore;
use crate::Result;

/// The first block version.
pub const BLOCK_VERSION_GENESIS: u32 = 1;
/// Version introduced by BIP34: height in the coinbase.
pub const BLOCK_VERSION_BIP34: u32 = 2;
/// Version introduced by BIP66: strict DER signatures.
pub const BLOCK_VERSION_BIP66: u32 = 3;
/// Version introduced by BIP65: OP_CHECKLOCKTIMEVERIFY.
pub const BLOCK_VERSION_BIP65: u32 = 4;

/// A rolling tally of the versions of the most recent blocks, used to judge when a new
/// block version has reached a supermajority and out-of-date blocks must be rejected.
pub struct VersionTally {
    window: Vec<u32>,
    write_head: usize,
    stored: usize,
}

impl VersionTally {
    pub fn new(window_size: usize) -> VersionTally {
        VersionTally {
            window: vec![0; window_size],
            write_head: 0,
            stored: 0,
        }
    }

    /// Record the version of a block appended to the best chain.
    pub fn add(&mut self, version: u32) {
        self.window[self.write_head] = version;
        self.write_head = (self.write_head + 1) % self.window.len();
        if self.stored < self.window.len() {
            self.stored += 1;
        }
    }

    /// Number of blocks in the window with a version at or above the given version.
    /// None until a full window has been observed.
    pub fn count_at_or_above(&self, version: u32) -> Option<usize> {
        if self.stored < self.window.len() {
            return None;
        }
        Some(self.window.iter().filter(|&&v| v >= version).count())
    }

    /// Seed the tally by walking backwards from the chain head. A short chain simply
    /// leaves the tally incomplete.
    pub fn initialize(&mut self, store: &dyn BlockStore, chain_head: &StoredBlock) -> Result<()> {
        let mut versions = Vec::with_capacity(self.window.len());
        let mut cursor = Some(chain_head.clone());
        while let Some(block) = cursor {
            versions.push(block.header.version);
            if versions.len() == self.window.len() {
                break;
            }
            cursor = store.prev(&block)?;
        }
        // oldest first, so the write head ends up just past the newest
        for version in versions.into_iter().rev() {
            self.add(version);
        }
        Ok(())
    }
}
