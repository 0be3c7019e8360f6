//! Attribution compaction pipeline and version-chain delta engine.
//!
//! Writers schedule attribute maps per document; a pool of workers debounces
//! them, folds them together with whatever is already persisted, writes one
//! superseding attribution object and deletes its predecessors. Reads merge
//! persisted and still-cached maps on demand. Independently, full document
//! snapshots are appended to a version chain from which incremental deltas
//! are derived.
//!
//! # Key Types
//!
//! - [`AttributionCache`] -- pending maps per document plus the coalescing work queue
//! - [`Compactor`] -- one merge-write-delete pass and its failure handling
//! - [`WorkerPool`] -- fixed-size pool of compaction loops
//! - [`AttributionService`] -- write (schedule) and read paths
//! - [`VersionChain`] -- snapshot storage and delta computation
//! - [`Pipeline`] -- wires the above around one blob store
//!
//! # Invariants
//!
//! 1. At most one work item per document is live at any instant.
//! 2. A pass shrinks the cache only by the length it snapshotted, and only
//!    after its write and delete succeeded.
//! 3. A superseding object is written before its predecessors are deleted.

pub mod attribute;
pub mod cache;
pub mod clock;
pub mod compactor;
pub mod config;
pub mod error;
mod fragments;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod versions;
pub mod worker;

pub use attribute::{attribute_update, UpdateAttribution};
pub use cache::{AttributionCache, Completion, WorkItem};
pub use clock::MonotonicClock;
pub use compactor::{Compactor, PassOutcome};
pub use config::PipelineConfig;
pub use error::{CoreError, CoreResult};
pub use pipeline::Pipeline;
pub use retry::{Backoff, RetryPolicy};
pub use service::AttributionService;
pub use versions::{VersionChain, VersionDelta};
pub use worker::WorkerPool;

#[cfg(test)]
pub(crate) mod testing;
