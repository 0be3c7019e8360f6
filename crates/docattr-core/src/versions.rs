//! Append-only chain of document snapshots and the deltas between them.

use std::sync::Arc;

use docattr_doc::{diff, Delta, Document, Update};
use docattr_store::{BlobStore, DocId, KeyScheme, ObjectClass, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::MonotonicClock;
use crate::error::{CoreError, CoreResult};

/// Delta from the previous snapshot (or the empty document) to the one
/// stored at `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDelta {
    pub timestamp: Timestamp,
    pub delta: Delta,
}

pub struct VersionChain {
    store: Arc<dyn BlobStore>,
    scheme: KeyScheme,
    clock: Arc<MonotonicClock>,
}

impl VersionChain {
    pub fn new(store: Arc<dyn BlobStore>, scheme: KeyScheme, clock: Arc<MonotonicClock>) -> Self {
        Self {
            store,
            scheme,
            clock,
        }
    }

    /// Validate and append a full snapshot. The returned timestamp is later
    /// than every version already stored for `docid`.
    pub async fn store_version(&self, docid: &DocId, snapshot: Vec<u8>) -> CoreResult<Timestamp> {
        Update::decode(&snapshot)?;
        let latest = self.list_version_timestamps(docid).await?.last().copied();
        let ts = self.clock.next_after(latest);
        let key = self.scheme.key(ObjectClass::Version, docid, ts);
        self.store.put(&key, snapshot).await?;
        debug!(%docid, %key, "stored version");
        Ok(ts)
    }

    /// Timestamps of every stored version, ascending.
    pub async fn list_version_timestamps(&self, docid: &DocId) -> CoreResult<Vec<Timestamp>> {
        let keys = self
            .store
            .list_prefix(&self.scheme.prefix(ObjectClass::Version, docid))
            .await?;
        let mut timestamps = keys
            .iter()
            .map(|key| KeyScheme::parse_timestamp(key))
            .collect::<Result<Vec<_>, _>>()?;
        timestamps.sort_unstable();
        Ok(timestamps)
    }

    pub async fn get_version(&self, docid: &DocId, timestamp: Timestamp) -> CoreResult<Vec<u8>> {
        let key = self.scheme.key(ObjectClass::Version, docid, timestamp);
        self.store
            .get(&key)
            .await?
            .ok_or_else(|| CoreError::VersionNotFound {
                docid: docid.clone(),
                timestamp,
            })
    }

    async fn load_document(&self, docid: &DocId, timestamp: Timestamp) -> CoreResult<Document> {
        let bytes = self.get_version(docid, timestamp).await?;
        Ok(Document::from_snapshot(&bytes)?)
    }

    /// Delta from version `from` (or the empty document) to version `to`.
    pub async fn get_version_delta(
        &self,
        docid: &DocId,
        from: Option<Timestamp>,
        to: Timestamp,
    ) -> CoreResult<Delta> {
        let before = match from {
            Some(ts) => self.load_document(docid, ts).await?,
            None => Document::new(0),
        };
        let after = self.load_document(docid, to).await?;
        Ok(diff(&before, &after))
    }

    /// One delta per stored version, in order; the first is relative to the
    /// empty document. Each snapshot is decoded once.
    pub async fn get_all_version_deltas(&self, docid: &DocId) -> CoreResult<Vec<VersionDelta>> {
        let timestamps = self.list_version_timestamps(docid).await?;
        let mut deltas = Vec::with_capacity(timestamps.len());
        let mut previous = Document::new(0);
        for timestamp in timestamps {
            let current = self.load_document(docid, timestamp).await?;
            deltas.push(VersionDelta {
                timestamp,
                delta: diff(&previous, &current),
            });
            previous = current;
        }
        Ok(deltas)
    }
}

impl std::fmt::Debug for VersionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionChain")
            .field("scheme", &self.scheme)
            .finish()
    }
}
