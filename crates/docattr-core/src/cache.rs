//! Pending attribute maps per document and the coalescing work queue.
//!
//! Both live behind one mutex so that "append and maybe enqueue" and
//! "shrink and maybe re-enqueue" are each a single critical section. That is
//! what upholds the single-flight rule: a document is armed exactly while one
//! work item for it exists, either queued or held by a worker.
//!
//! The lock is never held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use docattr_doc::AttributeMap;
use docattr_store::DocId;
use tokio::time::Instant;

use crate::retry::RetryPolicy;

/// A pending request to compact one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub docid: DocId,
    /// Start of the debounce window.
    pub enqueued_at: Instant,
    /// Failed passes so far.
    pub attempt: u32,
}

impl WorkItem {
    pub fn new(docid: DocId) -> Self {
        Self {
            docid,
            enqueued_at: Instant::now(),
            attempt: 0,
        }
    }
}

/// What happened to a document's entry after a successful pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Everything was persisted; the entry is gone.
    Retired,
    /// Maps arrived during the pass; a fresh work item was enqueued.
    Rearmed,
}

struct CachedMap {
    map: AttributeMap,
    size: usize,
}

#[derive(Default)]
struct Entry {
    items: Vec<CachedMap>,
    armed: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<DocId, Entry>,
    queue: VecDeque<WorkItem>,
    pending_bytes: usize,
}

/// Attribute maps awaiting compaction, plus the queue of documents to compact.
#[derive(Default)]
pub struct AttributionCache {
    state: Mutex<CacheState>,
}

impl AttributionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Append `map` to the document's pending list. Returns `true` when this
    /// call armed the document and enqueued a work item.
    pub fn schedule(&self, docid: DocId, map: AttributeMap) -> bool {
        let size = map.approx_size();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.pending_bytes += size;
        let entry = state.entries.entry(docid.clone()).or_default();
        entry.items.push(CachedMap { map, size });
        if entry.armed {
            return false;
        }
        entry.armed = true;
        state.queue.push_back(WorkItem::new(docid));
        true
    }

    /// Pop the oldest work item.
    pub fn dequeue(&self) -> Option<WorkItem> {
        self.lock().queue.pop_front()
    }

    /// Copy of the document's pending maps; its length is the count a pass
    /// may later remove with [`complete`](Self::complete).
    pub fn snapshot(&self, docid: &DocId) -> Vec<AttributeMap> {
        self.lock()
            .entries
            .get(docid)
            .map(|entry| entry.items.iter().map(|c| c.map.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop the first `n` pending maps after they were persisted. Retires the
    /// entry if nothing is left, otherwise enqueues a fresh work item.
    pub fn complete(&self, item: &WorkItem, n: usize) -> Completion {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(&item.docid) else {
            return Completion::Retired;
        };
        let n = n.min(entry.items.len());
        let freed: usize = entry.items.drain(..n).map(|c| c.size).sum();
        state.pending_bytes = state.pending_bytes.saturating_sub(freed);
        if entry.items.is_empty() {
            state.entries.remove(&item.docid);
            Completion::Retired
        } else {
            entry.armed = true;
            state.queue.push_back(WorkItem::new(item.docid.clone()));
            Completion::Rearmed
        }
    }

    /// Handle a failed pass. Enqueues a follow-up with `attempt + 1` while the
    /// policy allows it; otherwise disarms the document, keeping its maps so
    /// the next [`schedule`](Self::schedule) starts over.
    pub fn retry(&self, item: &WorkItem, policy: &RetryPolicy) -> Option<WorkItem> {
        let failures = item.attempt.saturating_add(1);
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.entries.get_mut(&item.docid) else {
            return None;
        };
        if !policy.should_retry(failures) {
            entry.armed = false;
            return None;
        }
        let next = WorkItem {
            docid: item.docid.clone(),
            enqueued_at: Instant::now(),
            attempt: failures,
        };
        state.queue.push_back(next.clone());
        Some(next)
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Documents with pending maps.
    pub fn pending_docs(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn pending_len(&self, docid: &DocId) -> usize {
        self.lock()
            .entries
            .get(docid)
            .map_or(0, |entry| entry.items.len())
    }

    /// Approximate bytes held by pending maps.
    pub fn pending_bytes(&self) -> usize {
        self.lock().pending_bytes
    }

    pub fn is_armed(&self, docid: &DocId) -> bool {
        self.lock()
            .entries
            .get(docid)
            .is_some_and(|entry| entry.armed)
    }

    /// `true` when nothing is pending and nothing is queued.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.entries.is_empty() && state.queue.is_empty()
    }
}

impl std::fmt::Debug for AttributionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AttributionCache")
            .field("pending_docs", &state.entries.len())
            .field("queued", &state.queue.len())
            .field("pending_bytes", &state.pending_bytes)
            .finish()
    }
}
