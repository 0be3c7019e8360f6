use std::sync::Arc;

use docattr_store::{BlobStore, KeyScheme};

use crate::cache::AttributionCache;
use crate::clock::MonotonicClock;
use crate::compactor::Compactor;
use crate::config::PipelineConfig;
use crate::service::AttributionService;
use crate::versions::VersionChain;
use crate::worker::WorkerPool;

/// Every pipeline component, wired around one blob store, cache and clock.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub attributions: Arc<AttributionService>,
    pub versions: Arc<VersionChain>,
    pub compactor: Arc<Compactor>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(store: Arc<dyn BlobStore>, scheme: KeyScheme, config: PipelineConfig) -> Self {
        let cache = Arc::new(AttributionCache::new());
        let clock = Arc::new(MonotonicClock::new());
        let compactor = Arc::new(Compactor::new(
            Arc::clone(&store),
            scheme.clone(),
            Arc::clone(&cache),
            Arc::clone(&clock),
            config.min_cache_time(),
            config.retry.clone(),
        ));
        let attributions = Arc::new(AttributionService::new(
            Arc::clone(&store),
            scheme.clone(),
            cache,
        ));
        let versions = Arc::new(VersionChain::new(store, scheme, clock));
        Self {
            attributions,
            versions,
            compactor,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AttributionCache> {
        self.attributions.cache()
    }

    /// Start `config.workers` compaction loops.
    pub fn start_workers(&self) -> WorkerPool {
        WorkerPool::spawn(
            Arc::clone(&self.compactor),
            self.config.workers,
            self.config.idle_poll_interval(),
        )
    }
}
