use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::traits::BlobStore;

/// In-memory, BTreeMap-based blob store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock`;
/// the sorted map gives prefix listing in key order for free.
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryBlobStore")
            .field("object_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryBlobStore::new();
        store.put("attrs:d:1", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("attrs:d:1").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = InMemoryBlobStore::new();
        store.put("k", b"old".to_vec()).await.unwrap();
        store.put("k", b"new".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.total_bytes(), 3);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryBlobStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(matches!(
            store.get_required("missing").await,
            Err(StoreError::NotFound(key)) if key == "missing"
        ));
    }

    #[tokio::test]
    async fn delete_many_ignores_missing_keys() {
        let store = InMemoryBlobStore::new();
        store.put("a", vec![1]).await.unwrap();
        store.put("b", vec![2]).await.unwrap();
        store
            .delete_many(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(store.keys(), vec!["b".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Prefix listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_prefix_is_sorted_and_exact() {
        let store = InMemoryBlobStore::new();
        for key in ["attrs:d1:3", "attrs:d1:1", "attrs:d10:2", "version:d1:1", "attrs:d1:2"] {
            store.put(key, Vec::new()).await.unwrap();
        }
        let keys = store.list_prefix("attrs:d1:").await.unwrap();
        assert_eq!(keys, vec!["attrs:d1:1", "attrs:d1:2", "attrs:d1:3"]);
        assert!(store.list_prefix("nothing:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_removes_all() {
        let store = InMemoryBlobStore::default();
        store.put("a", vec![1]).await.unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlobStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("object_count"));
    }
}
