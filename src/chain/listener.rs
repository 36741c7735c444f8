use crate::chain::block::StoredBlock;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Something that can run a unit of work, deciding on which thread it happens.
///
/// Listener registrations carry one of these; [SameThreadExecutor] is the distinguished
/// inline executor whose callbacks run on the thread that ingested the block and whose
/// errors propagate back into the ingest call.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Box<dyn FnOnce() + Send>);

    /// True only for the inline executor.
    fn is_same_thread(&self) -> bool {
        false
    }
}

/// Runs callbacks inline on the calling thread.
pub struct SameThreadExecutor;

impl Executor for SameThreadExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }

    fn is_same_thread(&self) -> bool {
        true
    }
}

/// The inline executor.
pub fn same_thread() -> Arc<dyn Executor> {
    Arc::new(SameThreadExecutor)
}

/// Notified every time the chain head advances to a new best block.
pub trait NewBestBlockListener: Send + Sync {
    fn notify_new_best_block(&self, block: &StoredBlock) -> Result<()>;
}

/// Notified when the best chain changes to one that does not extend the previous head.
///
/// `old_blocks` and `new_blocks` run from each tip down to, but excluding, the split
/// point.
pub trait ReorganizeListener: Send + Sync {
    fn reorganize(
        &self,
        split_point: &StoredBlock,
        old_blocks: &[StoredBlock],
        new_blocks: &[StoredBlock],
    ) -> Result<()>;
}

/// Identifies a listener registration for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct ListenerRegistration<T: ?Sized> {
    pub id: ListenerId,
    pub executor: Arc<dyn Executor>,
    pub listener: Arc<T>,
}

impl<T: ?Sized> Clone for ListenerRegistration<T> {
    fn clone(&self) -> Self {
        ListenerRegistration {
            id: self.id,
            executor: Arc::clone(&self.executor),
            listener: Arc::clone(&self.listener),
        }
    }
}

/// A copy-on-write list of listener registrations. Iteration takes a snapshot so
/// callbacks never run under the lock and may remove themselves.
pub(crate) struct ListenerList<T: ?Sized> {
    entries: RwLock<Vec<ListenerRegistration<T>>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> ListenerList<T> {
    pub fn new() -> ListenerList<T> {
        ListenerList {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, executor: Arc<dyn Executor>, listener: Arc<T>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write().expect("listener lock poisoned");
        entries.push(ListenerRegistration {
            id,
            executor,
            listener,
        });
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().expect("listener lock poisoned");
        let before = entries.len();
        entries.retain(|r| r.id != id);
        entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<ListenerRegistration<T>> {
        self.entries.read().expect("listener lock poisoned").clone()
    }
}
