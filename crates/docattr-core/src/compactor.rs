//! One compaction pass: debounce, merge persisted and cached maps, write the
//! superseding object, delete its predecessors, shrink the cache.

use std::sync::Arc;
use std::time::Duration;

use docattr_doc::AttributeMap;
use docattr_store::{BlobStore, KeyScheme, ObjectClass};
use tracing::{debug, error, warn};

use crate::cache::{AttributionCache, Completion, WorkItem};
use crate::clock::MonotonicClock;
use crate::error::CoreResult;
use crate::fragments;
use crate::retry::RetryPolicy;

/// Result of [`Compactor::process`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(Completion),
    /// The pass failed and a follow-up with this attempt number was queued.
    Retrying { attempt: u32 },
    /// The pass failed and the retry policy is exhausted.
    GaveUp { attempts: u32 },
}

pub struct Compactor {
    store: Arc<dyn BlobStore>,
    scheme: KeyScheme,
    cache: Arc<AttributionCache>,
    clock: Arc<MonotonicClock>,
    min_cache_time: Duration,
    retry: RetryPolicy,
}

impl Compactor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        scheme: KeyScheme,
        cache: Arc<AttributionCache>,
        clock: Arc<MonotonicClock>,
        min_cache_time: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            scheme,
            cache,
            clock,
            min_cache_time,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<AttributionCache> {
        &self.cache
    }

    /// Time left before `item` may be compacted.
    pub fn debounce_delay(&self, item: &WorkItem) -> Duration {
        self.min_cache_time
            .saturating_sub(item.enqueued_at.elapsed())
            .saturating_add(self.retry.delay(item.attempt))
    }

    /// Wait out the debounce window, run the pass, and route a failure
    /// through the retry policy. Never returns an error.
    pub async fn process(&self, item: WorkItem) -> PassOutcome {
        let delay = self.debounce_delay(&item);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.compact(&item).await {
            Ok(completion) => PassOutcome::Completed(completion),
            Err(err) => match self.cache.retry(&item, &self.retry) {
                Some(next) => {
                    warn!(
                        docid = %item.docid,
                        attempt = next.attempt,
                        error = %err,
                        "compaction failed, retrying"
                    );
                    PassOutcome::Retrying {
                        attempt: next.attempt,
                    }
                }
                None => {
                    let attempts = item.attempt.saturating_add(1);
                    error!(
                        docid = %item.docid,
                        attempts,
                        error = %err,
                        "compaction failed, giving up until the next write"
                    );
                    PassOutcome::GaveUp { attempts }
                }
            },
        }
    }

    /// The pass itself, without debounce. On error nothing was deleted and
    /// the cache is untouched.
    pub async fn compact(&self, item: &WorkItem) -> CoreResult<Completion> {
        let cached = self.cache.snapshot(&item.docid);
        let n = cached.len();

        let persisted = fragments::load(&*self.store, &self.scheme, &item.docid).await?;
        let merged = AttributeMap::merge_all(persisted.maps.iter().chain(cached.iter()));

        if !merged.is_empty() {
            let bytes = merged.encode()?;
            let ts = self.clock.next_after(persisted.latest_timestamp());
            let key = self.scheme.key(ObjectClass::Attribution, &item.docid, ts);
            self.store.put(&key, bytes).await?;
            if !persisted.keys.is_empty() {
                self.store.delete_many(&persisted.keys).await?;
            }
            debug!(
                docid = %item.docid,
                %key,
                persisted = persisted.keys.len(),
                cached = n,
                "compacted attributions"
            );
        }

        Ok(self.cache.complete(item, n))
    }
}

impl std::fmt::Debug for Compactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compactor")
            .field("scheme", &self.scheme)
            .field("min_cache_time", &self.min_cache_time)
            .field("retry", &self.retry)
            .finish()
    }
}
