//! The block chain engine.
//!
//! [BlockChain] links [StoredBlock]s into the best-work chain against a pluggable
//! [BlockStore], retaining unparented blocks in an orphan pool and reorganizing when a
//! side branch overtakes the head. Context rules (difficulty retargets, fork
//! activations) are supplied by a [RuleCheckerFactory].

mod block;
mod engine;
mod future;
mod listener;
mod rules;
mod store;
mod version_tally;

pub use block::{BlockMeta, ChainInfo, StoredBlock};
pub use engine::{BlockAddResult, BlockChain};
pub use future::HeightFuture;
pub use listener::{
    same_thread, Executor, ListenerId, NewBestBlockListener, ReorganizeListener,
    SameThreadExecutor,
};
pub use rules::{AlwaysValidRules, RuleChecker, RuleCheckerFactory};
pub use store::{BlockStore, MemoryBlockStore};
pub use version_tally::{
    VersionTally, BLOCK_VERSION_BIP34, BLOCK_VERSION_BIP65, BLOCK_VERSION_BIP66,
    BLOCK_VERSION_GENESIS,
};
