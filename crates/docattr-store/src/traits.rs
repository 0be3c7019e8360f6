use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Bucket-style object store.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces any existing object under the same key atomically:
///   readers see either the old or the new bytes, never a mix.
/// - `list_prefix` returns every key starting with `prefix`, sorted
///   ascending. Visibility of a just-written key may be delayed on
///   eventually consistent backends; callers tolerate that.
/// - `delete_many` ignores keys that do not exist.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read an object. Returns `Ok(None)` if it does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write (create or replace) an object.
    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Delete a batch of objects.
    async fn delete_many(&self, keys: &[String]) -> StoreResult<()>;

    /// List all keys starting with `prefix`, in ascending order.
    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Read an object that must exist.
    async fn get_required(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
