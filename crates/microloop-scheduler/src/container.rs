//! Thread-safe store of scheduled tasks ordered by wake time.

use crate::task::TaskId;
use crate::wrapper::ScheduledTask;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Ordering key: wake time first, insertion sequence as the deterministic
/// tie-breaker for identical wake times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WakeKey {
    wake_at_micros: i64,
    seq: u64,
}

#[derive(Default)]
struct ContainerInner {
    queue: BTreeMap<WakeKey, Arc<ScheduledTask>>,
    by_id: HashMap<TaskId, WakeKey>,
    next_seq: u64,
}

impl ContainerInner {
    fn next_key(&mut self, wake_at_micros: i64) -> WakeKey {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        WakeKey {
            wake_at_micros,
            seq,
        }
    }

    fn insert(&mut self, entry: Arc<ScheduledTask>) {
        // Re-adding an id replaces the previous entry so the queue and the
        // index never disagree.
        if let Some(stale) = self.by_id.remove(&entry.id()) {
            self.queue.remove(&stale);
        }
        let key = self.next_key(entry.wake_at_micros());
        self.by_id.insert(entry.id(), key);
        self.queue.insert(key, entry);
    }

    fn remove_by_id(&mut self, id: TaskId) {
        if let Some(key) = self.by_id.remove(&id) {
            self.queue.remove(&key);
        }
    }
}

/// Wake-time-ordered task store.
///
/// One exclusive lock serializes every operation; the ordered queue and the
/// id index are only ever mutated together, so no caller can observe them
/// out of sync. Insert and remove are logarithmic, id lookup is constant.
pub(crate) struct TaskContainer {
    inner: Mutex<ContainerInner>,
}

impl TaskContainer {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(ContainerInner::default()),
        }
    }

    pub(crate) fn add(&self, entry: Arc<ScheduledTask>) {
        self.inner.lock().insert(entry);
    }

    /// Remove by id. A no-op when the id is not present.
    pub(crate) fn remove_by_id(&self, id: TaskId) {
        self.inner.lock().remove_by_id(id);
    }

    pub(crate) fn remove(&self, entry: &Arc<ScheduledTask>) {
        self.remove_by_id(entry.id());
    }

    /// Peek the entry with the earliest wake time without removing it.
    pub(crate) fn closest(&self) -> Option<Arc<ScheduledTask>> {
        let inner = self.inner.lock();
        inner.queue.first_key_value().map(|(_, entry)| Arc::clone(entry))
    }

    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.inner.lock().by_id.contains_key(&id)
    }

    /// Re-key an entry after its wake time advanced.
    ///
    /// Deliberately re-inserts even when the id is no longer present: a task
    /// cancelled while it was executing and asking to repeat comes back.
    /// See the cancellation caveat in the crate docs.
    pub(crate) fn reschedule(&self, entry: &Arc<ScheduledTask>) {
        self.inner.lock().insert(Arc::clone(entry));
    }

    pub(crate) fn count(&self) -> usize {
        self.inner.lock().queue.len()
    }
}
