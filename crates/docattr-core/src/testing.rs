//! Shared fixtures for the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docattr_doc::{AttributeMap, AttributionItem, IdRange};
use docattr_store::{BlobStore, DocId, InMemoryBlobStore, StoreError, StoreResult};

pub fn doc(id: &str) -> DocId {
    DocId::new(id).unwrap()
}

pub fn insert_map(client: u64, start: u64, len: u64, user: &str) -> AttributeMap {
    let mut map = AttributeMap::new();
    map.insert_range(
        IdRange::new(client, start, len),
        &[AttributionItem::insert(user), AttributionItem::insert_at(1)],
    );
    map
}

/// Which store call a [`FlakyStore`] sabotages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Put,
    DeleteMany,
    ListPrefix,
}

/// In-memory store that fails the first `failures` calls of one kind.
pub struct FlakyStore {
    pub inner: Arc<InMemoryBlobStore>,
    fail_on: FailOn,
    remaining: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_on: FailOn, failures: usize) -> Self {
        Self {
            inner: Arc::new(InMemoryBlobStore::new()),
            fail_on,
            remaining: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    fn trip(&self, op: FailOn) -> StoreResult<()> {
        if op != self.fail_on {
            return Ok(());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tripped = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::Backend(format!("injected {op:?} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        self.trip(FailOn::Put)?;
        self.inner.put(key, data).await
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        self.trip(FailOn::DeleteMany)?;
        self.inner.delete_many(keys).await
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.trip(FailOn::ListPrefix)?;
        self.inner.list_prefix(prefix).await
    }
}
