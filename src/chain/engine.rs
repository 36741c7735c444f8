use crate::bitcoin::pow::check_proof_of_work;
use crate::bitcoin::{BlockHash, BlockchainParams};
use crate::chain::block::StoredBlock;
use crate::chain::future::HeightFuture;
use crate::chain::listener::{
    same_thread, Executor, ListenerId, ListenerList, NewBestBlockListener, ReorganizeListener,
};
use crate::chain::rules::RuleCheckerFactory;
use crate::chain::store::BlockStore;
use crate::chain::version_tally::{VersionTally, BLOCK_VERSION_BIP34, BLOCK_VERSION_BIP66};
use crate::{Error, Result};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

/// Seconds between blocks that the network aims for.
const TARGET_BLOCK_SPACING: i64 = 600;

/// How many trailing blocks feed the median-time-past rule.
const MEDIAN_TIME_SPAN: usize = 11;

/// Outcome of offering a block to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAddResult {
    /// The block was linked into the chain (not necessarily as the new head).
    Accepted,
    /// The block's parent is unknown; it was retained in the orphan pool.
    Orphaned,
}

/// A BlockChain holds [StoredBlock]s, links them together, and knows how to verify that
/// the chain follows the network rules.
///
/// The chain is really a tree: when blocks are found simultaneously there are competing
/// branches, and the branch representing the most cumulative work is the best chain. A
/// block that extends a side branch past the best chain's work triggers a reorganize,
/// reported to [ReorganizeListener]s.
///
/// The engine stores nothing itself; blocks live in the [BlockStore] it is constructed
/// with, and context rules such as the difficulty schedule come from the injected
/// [RuleCheckerFactory].
///
/// All ingest work is serialized by an internal lock. Reads of the head are guarded
/// separately so they stay cheap while a download or reorganize is in progress.
pub struct BlockChain<S: BlockStore> {
    params: BlockchainParams,
    rule_factory: Box<dyn RuleCheckerFactory>,
    store: S,
    // the chain lock: serializes add/orphan/reorganize
    state: Mutex<ChainState>,
    // publication lock for the head so readers never see a torn value
    head: RwLock<StoredBlock>,
    new_best_block_listeners: Arc<ListenerList<dyn NewBestBlockListener>>,
    reorganize_listeners: Arc<ListenerList<dyn ReorganizeListener>>,
}

struct ChainState {
    // blocks whose parent we have not seen yet, keyed by their own hash
    orphan_blocks: HashMap<BlockHash, StoredBlock>,
    version_tally: VersionTally,
}

impl<S: BlockStore> BlockChain<S> {
    /// Construct a chain engine over a store. The store must already hold at least the
    /// genesis block and report a chain head.
    pub fn new(
        params: BlockchainParams,
        rule_factory: Box<dyn RuleCheckerFactory>,
        store: S,
    ) -> Result<BlockChain<S>> {
        let head = store.chain_head()?;
        info!(
            "chain head is at height {}: {}",
            head.height(),
            head.hash()
        );
        let mut version_tally = VersionTally::new(params.majority_window);
        version_tally.initialize(&store, &head)?;
        Ok(BlockChain {
            params,
            rule_factory,
            store,
            state: Mutex::new(ChainState {
                orphan_blocks: HashMap::new(),
                version_tally,
            }),
            head: RwLock::new(head),
            new_best_block_listeners: Arc::new(ListenerList::new()),
            reorganize_listeners: Arc::new(ListenerList::new()),
        })
    }

    /// The store this chain was constructed with.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn params(&self) -> &BlockchainParams {
        &self.params
    }

    /// Process a candidate block and try to link it into the chain.
    ///
    /// Returns [BlockAddResult::Orphaned] if the block is fine but its parent is
    /// unknown. Verification failures abort the ingest, leave the chain unchanged, and
    /// run the store's abort hook.
    pub fn add(&self, candidate: StoredBlock) -> Result<BlockAddResult> {
        let mut state = self.state.lock().expect("chain lock poisoned");
        let result = self.add_locked(&mut state, candidate, true);
        if let Err(e) = &result {
            if e.is_verification_failure() {
                if let Err(abort) = self.store.not_setting_chain_head() {
                    error!("store abort hook failed: {}", abort);
                }
            }
        }
        result
    }

    fn add_locked(
        &self,
        state: &mut ChainState,
        block: StoredBlock,
        try_connecting: bool,
    ) -> Result<BlockAddResult> {
        let hash = block.hash();

        // cheap duplicate check before the expensive work below; re-announcements of
        // the head are common during sync
        if hash == self.chain_head().hash() {
            return Ok(BlockAddResult::Accepted);
        }
        if try_connecting && state.orphan_blocks.contains_key(&hash) {
            return Ok(BlockAddResult::Orphaned);
        }

        check_proof_of_work(&block.header, &self.params.max_target)?;

        let parent = match self.store.get(&block.header.prev_hash)? {
            Some(parent) => parent,
            None => {
                // probably still downloading the chain; keep it for later
                warn!(
                    "block does not connect: {} prev {}",
                    hash, block.header.prev_hash
                );
                state.orphan_blocks.insert(hash, block);
                return Ok(BlockAddResult::Orphaned);
            }
        };

        let checker = self.rule_factory.rule_checker(&parent, &block);
        checker.check_rules(&parent, &block, &self.store)?;

        self.connect_block(state, block, parent)?;

        if try_connecting {
            self.try_connecting_orphans(state)?;
        }
        Ok(BlockAddResult::Accepted)
    }

    fn connect_block(
        &self,
        state: &mut ChainState,
        block: StoredBlock,
        parent: StoredBlock,
    ) -> Result<()> {
        let hash = block.hash();
        let new_height = parent.height() + 1;
        if !self.params.passes_checkpoint(new_height, &hash) {
            return Err(Error::RulesViolated(format!(
                "block {} failed the checkpoint at height {}",
                hash, new_height
            )));
        }

        let head = self.chain_head();
        if parent.hash() == head.hash() {
            // normal continuation of the best chain
            let median = self.median_time_past(&head)?;
            if (block.header.timestamp as u64) <= median {
                return Err(Error::RulesViolated(format!(
                    "block timestamp {} is not later than the median time past {}",
                    block.header.timestamp, median
                )));
            }

            // once a newer version is a supermajority, the superseded versions are
            // rejected at the tip
            let version = block.header.version;
            if version == BLOCK_VERSION_BIP34 || version == BLOCK_VERSION_BIP66 {
                if let Some(count) = state.version_tally.count_at_or_above(version + 1) {
                    if count >= self.params.majority_reject_block_outdated {
                        return Err(Error::RulesViolated(format!(
                            "block version {} is out of date",
                            version
                        )));
                    }
                }
            }

            let new_block = parent.build_next(&block)?;
            self.store.put(&new_block)?;
            state.version_tally.add(version);
            self.set_chain_head(&new_block)?;
            debug!(
                "chain is now {} blocks high, running listeners",
                new_block.height()
            );
            self.notify_new_best_block(&new_block)?;
        } else {
            // the block connects somewhere below the head, on a side branch
            let new_block = parent.build_next(&block)?;
            if new_block.more_work_than(&head) {
                info!("block is causing a re-organize");
                self.store.put(&new_block)?;
                self.handle_new_best_chain(new_block, head)?;
            } else {
                let split = find_split(&new_block, &head, &self.store)?;
                if split.hash() == new_block.hash() {
                    // an old main-chain block we already linked; reprocessing it would
                    // only confuse the listeners
                    warn!(
                        "saw duplicated block in main chain at height {}: {}",
                        new_block.height(),
                        hash
                    );
                    return Ok(());
                }
                self.store.put(&new_block)?;
                info!(
                    "block forks the chain at height {}/block {}, but it did not cause a reorganize: {}",
                    split.height(),
                    split.hash(),
                    hash
                );
            }
        }
        Ok(())
    }

    /// Called when a side branch has overtaken the chain we believed was best.
    fn handle_new_best_chain(&self, new_chain_head: StoredBlock, head: StoredBlock) -> Result<()> {
        let split = find_split(&new_chain_head, &head, &self.store)?;
        info!("re-organize after split at height {}", split.height());
        info!("old chain head: {}", head.hash());
        info!("new chain head: {}", new_chain_head.hash());
        info!("split at block: {}", split.hash());

        let old_blocks = partial_chain(&head, &split, &self.store)?;
        let new_blocks = partial_chain(&new_chain_head, &split, &self.store)?;

        self.notify_reorganize(&split, &old_blocks, &new_blocks)?;

        self.set_chain_head(&new_chain_head)?;
        Ok(())
    }

    /// For each orphan, see if its parent has shown up, and if so connect it. Connecting
    /// one orphan can unlock others, so keep sweeping until a pass connects nothing.
    fn try_connecting_orphans(&self, state: &mut ChainState) -> Result<()> {
        loop {
            let mut connected = 0;
            let hashes: Vec<BlockHash> = state.orphan_blocks.keys().copied().collect();
            for hash in hashes {
                let orphan = match state.orphan_blocks.get(&hash) {
                    Some(orphan) => orphan.clone(),
                    None => continue,
                };
                if self.store.get(&orphan.header.prev_hash)?.is_none() {
                    debug!("orphan block {} is not connectable right now", hash);
                    continue;
                }
                // false here stops the orphan sweep from recursing
                self.add_locked(state, orphan, false)?;
                state.orphan_blocks.remove(&hash);
                info!("connected orphan {}", hash);
                connected += 1;
            }
            if connected == 0 {
                break;
            }
            info!("connected {} orphan blocks", connected);
        }
        Ok(())
    }

    /// Returns the hashes of the currently stored orphan blocks and then deletes them.
    /// Used by the network layer when a filter exhaustion event means the downloaded
    /// orphans may be incomplete.
    pub fn drain_orphan_blocks(&self) -> HashSet<BlockHash> {
        let mut state = self.state.lock().expect("chain lock poisoned");
        let hashes = state.orphan_blocks.keys().copied().collect();
        state.orphan_blocks.clear();
        hashes
    }

    /// Walk backwards through the orphan pool from the given hash to the most distant
    /// ancestor we have that is itself an orphan. None if `from` is not an orphan.
    pub fn orphan_root(&self, from: &BlockHash) -> Option<StoredBlock> {
        let state = self.state.lock().expect("chain lock poisoned");
        let mut cursor = state.orphan_blocks.get(from)?;
        while let Some(parent) = state.orphan_blocks.get(&cursor.header.prev_hash) {
            cursor = parent;
        }
        Some(cursor.clone())
    }

    /// True if the given block is currently in the orphan pool.
    pub fn is_orphan(&self, hash: &BlockHash) -> bool {
        self.state
            .lock()
            .expect("chain lock poisoned")
            .orphan_blocks
            .contains_key(hash)
    }

    /// The block at the head of the best known chain.
    pub fn chain_head(&self) -> StoredBlock {
        self.head.read().expect("head lock poisoned").clone()
    }

    /// Convenience for `chain_head().height()`.
    pub fn best_chain_height(&self) -> u32 {
        self.chain_head().height()
    }

    /// Estimate when the chain will reach the given height, as a unix timestamp,
    /// assuming the ideal spacing of ten minutes per block. Past heights are
    /// extrapolated the same way rather than looked up.
    pub fn estimate_block_time(&self, height: u32) -> i64 {
        let head = self.chain_head();
        let offset = height as i64 - head.height() as i64;
        head.header.timestamp as i64 + TARGET_BLOCK_SPACING * offset
    }

    /// A future that completes when the chain reaches the given height, yielding the
    /// block that got there first. Completion happens on the thread that connected the
    /// triggering block.
    pub fn height_future(&self, height: u32) -> HeightFuture {
        let future = HeightFuture::new();
        let listener = Arc::new(HeightListener {
            height,
            future: future.clone(),
            registry: Arc::downgrade(&self.new_best_block_listeners),
            own_id: OnceLock::new(),
        });
        let id = self
            .new_best_block_listeners
            .add(same_thread(), listener.clone());
        let _ = listener.own_id.set(id);
        future
    }

    /// Register a listener for head advances. With a [same_thread] executor the callback
    /// runs on the ingesting thread and its errors unwind the `add` call; on any other
    /// executor errors are logged and swallowed.
    pub fn add_new_best_block_listener(
        &self,
        executor: Arc<dyn Executor>,
        listener: Arc<dyn NewBestBlockListener>,
    ) -> ListenerId {
        self.new_best_block_listeners.add(executor, listener)
    }

    pub fn remove_new_best_block_listener(&self, id: ListenerId) -> bool {
        self.new_best_block_listeners.remove(id)
    }

    /// Register a listener for reorganizations. Executor semantics as for
    /// [add_new_best_block_listener](BlockChain::add_new_best_block_listener).
    pub fn add_reorganize_listener(
        &self,
        executor: Arc<dyn Executor>,
        listener: Arc<dyn ReorganizeListener>,
    ) -> ListenerId {
        self.reorganize_listeners.add(executor, listener)
    }

    pub fn remove_reorganize_listener(&self, id: ListenerId) -> bool {
        self.reorganize_listeners.remove(id)
    }

    fn set_chain_head(&self, block: &StoredBlock) -> Result<()> {
        self.store.set_chain_head(block)?;
        *self.head.write().expect("head lock poisoned") = block.clone();
        Ok(())
    }

    fn notify_new_best_block(&self, block: &StoredBlock) -> Result<()> {
        for registration in self.new_best_block_listeners.snapshot() {
            if registration.executor.is_same_thread() {
                registration.listener.notify_new_best_block(block)?;
            } else {
                let listener = Arc::clone(&registration.listener);
                let block = block.clone();
                registration.executor.execute(Box::new(move || {
                    if let Err(e) = listener.notify_new_best_block(&block) {
                        error!("block chain listener threw error: {}", e);
                    }
                }));
            }
        }
        Ok(())
    }

    fn notify_reorganize(
        &self,
        split: &StoredBlock,
        old_blocks: &[StoredBlock],
        new_blocks: &[StoredBlock],
    ) -> Result<()> {
        for registration in self.reorganize_listeners.snapshot() {
            if registration.executor.is_same_thread() {
                registration
                    .listener
                    .reorganize(split, old_blocks, new_blocks)?;
            } else {
                let listener = Arc::clone(&registration.listener);
                let split = split.clone();
                let old_blocks = old_blocks.to_vec();
                let new_blocks = new_blocks.to_vec();
                registration.executor.execute(Box::new(move || {
                    if let Err(e) = listener.reorganize(&split, &old_blocks, &new_blocks) {
                        error!("block chain listener threw error during reorg: {}", e);
                    }
                }));
            }
        }
        Ok(())
    }

    /// The median of the timestamps of the last eleven blocks ending at `block`. A new
    /// best block must be later than this.
    fn median_time_past(&self, block: &StoredBlock) -> Result<u64> {
        let mut timestamps = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut cursor = Some(block.clone());
        while let Some(b) = cursor {
            timestamps.push(b.header.timestamp as u64);
            if timestamps.len() == MEDIAN_TIME_SPAN {
                break;
            }
            cursor = self.store.prev(&b)?;
        }
        timestamps.sort_unstable();
        Ok(timestamps[(timestamps.len() - 1) / 2])
    }
}

/// Locates the point at which the chains ending at `new_head` and `old_head` diverge.
/// Returns one of the inputs if they are on a single chain.
fn find_split(
    new_head: &StoredBlock,
    old_head: &StoredBlock,
    store: &dyn BlockStore,
) -> Result<StoredBlock> {
    let mut current_cursor = old_head.clone();
    let mut new_cursor = new_head.clone();
    // walk both cursors backwards, always advancing the deeper one, until they meet:
    //
    //    A -> B -> C -> D
    //         \--> E -> F -> G
    //
    // with old_head = D and new_head = G this yields B.
    while current_cursor.hash() != new_cursor.hash() {
        if current_cursor.height() > new_cursor.height() {
            current_cursor = store.prev(&current_cursor)?.ok_or_else(|| {
                Error::Verification("attempt to follow an orphan chain".to_string())
            })?;
        } else {
            new_cursor = store.prev(&new_cursor)?.ok_or_else(|| {
                Error::Verification("attempt to follow an orphan chain".to_string())
            })?;
        }
    }
    Ok(current_cursor)
}

/// The contiguous blocks from `higher` down to `lower`; `higher` included, `lower` not.
fn partial_chain(
    higher: &StoredBlock,
    lower: &StoredBlock,
    store: &dyn BlockStore,
) -> Result<Vec<StoredBlock>> {
    if higher.height() <= lower.height() {
        return Err(Error::Internal(
            "higher and lower are reversed".to_string(),
        ));
    }
    let mut results = Vec::new();
    let mut cursor = higher.clone();
    loop {
        results.push(cursor.clone());
        cursor = store
            .prev(&cursor)?
            .ok_or_else(|| Error::Verification("ran off the end of the chain".to_string()))?;
        if cursor.hash() == lower.hash() {
            break;
        }
    }
    Ok(results)
}

struct HeightListener {
    height: u32,
    future: HeightFuture,
    registry: Weak<ListenerList<dyn NewBestBlockListener>>,
    own_id: OnceLock<ListenerId>,
}

impl NewBestBlockListener for HeightListener {
    fn notify_new_best_block(&self, block: &StoredBlock) -> Result<()> {
        if block.height() >= self.height {
            if let (Some(registry), Some(id)) = (self.registry.upgrade(), self.own_id.get()) {
                registry.remove(*id);
            }
            self.future.complete(block.clone());
        }
        Ok(())
    }
}
