use crate::chain::block::StoredBlock;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A promise for a future [StoredBlock], completed at most once.
///
/// This is a plain blocking primitive: the completing thread is the one that delivered
/// the triggering chain notification, and waiters block on a condition variable. There
/// is no built-in timeout; callers that need one use [wait_timeout](HeightFuture::wait_timeout).
#[derive(Clone)]
pub struct HeightFuture {
    state: Arc<State>,
}

struct State {
    value: Mutex<Option<StoredBlock>>,
    ready: Condvar,
}

impl HeightFuture {
    pub(crate) fn new() -> HeightFuture {
        HeightFuture {
            state: Arc::new(State {
                value: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Complete the future. Later completions are ignored.
    pub(crate) fn complete(&self, block: StoredBlock) {
        let mut value = self.state.value.lock().expect("future lock poisoned");
        if value.is_none() {
            *value = Some(block);
            self.state.ready.notify_all();
        }
    }

    /// Whether the future has completed.
    pub fn is_complete(&self) -> bool {
        self.state
            .value
            .lock()
            .expect("future lock poisoned")
            .is_some()
    }

    /// Block until the future completes and return the block.
    pub fn get(&self) -> StoredBlock {
        let mut value = self.state.value.lock().expect("future lock poisoned");
        loop {
            if let Some(block) = value.as_ref() {
                return block.clone();
            }
            value = self.state.ready.wait(value).expect("future lock poisoned");
        }
    }

    /// Block for at most `timeout` waiting for completion.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StoredBlock> {
        let deadline = std::time::Instant::now() + timeout;
        let mut value = self.state.value.lock().expect("future lock poisoned");
        loop {
            if let Some(block) = value.as_ref() {
                return Some(block.clone());
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .state
                .ready
                .wait_timeout(value, deadline - now)
                .expect("future lock poisoned");
            value = guard;
        }
    }
}
