//! Write and read paths for attributions.

use std::sync::Arc;

use docattr_doc::AttributeMap;
use docattr_store::{BlobStore, DocId, KeyScheme};
use tracing::debug;

use crate::attribute::{attribute_update, UpdateAttribution};
use crate::cache::AttributionCache;
use crate::error::CoreResult;
use crate::fragments;

/// How many times a read re-lists when an object disappears under it.
const READ_ATTEMPTS: usize = 3;

pub struct AttributionService {
    store: Arc<dyn BlobStore>,
    scheme: KeyScheme,
    cache: Arc<AttributionCache>,
}

impl AttributionService {
    pub fn new(store: Arc<dyn BlobStore>, scheme: KeyScheme, cache: Arc<AttributionCache>) -> Self {
        Self {
            store,
            scheme,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<AttributionCache> {
        &self.cache
    }

    /// Queue `map` for compaction. Returns `true` if this armed the document.
    pub fn schedule(&self, docid: DocId, map: AttributeMap) -> bool {
        self.cache.schedule(docid, map)
    }

    /// Attribute an encoded update and schedule the result.
    pub fn attribute(
        &self,
        docid: DocId,
        update: &[u8],
        attribution: &UpdateAttribution,
    ) -> CoreResult<bool> {
        let map = attribute_update(update, attribution)?;
        Ok(self.schedule(docid, map))
    }

    /// Everything known about `docid`: persisted objects merged with the
    /// maps still waiting in the cache. Mutates nothing.
    pub async fn get_attributions(&self, docid: &DocId) -> CoreResult<AttributeMap> {
        let mut attempt = 1;
        let persisted = loop {
            let persisted = fragments::load(&*self.store, &self.scheme, docid).await?;
            // A concurrent pass replaced what we listed; its output is newer.
            if persisted.vanished == 0 || attempt == READ_ATTEMPTS {
                break persisted;
            }
            debug!(%docid, attempt, "attribution objects moved during read, relisting");
            attempt += 1;
        };
        let cached = self.cache.snapshot(docid);
        Ok(AttributeMap::merge_all(
            persisted.maps.iter().chain(cached.iter()),
        ))
    }
}

impl std::fmt::Debug for AttributionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributionService")
            .field("scheme", &self.scheme)
            .field("cache", &self.cache)
            .finish()
    }
}
