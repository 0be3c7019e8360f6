//! Blob store adapter for docattr.
//!
//! Attribution fragments and version snapshots live in a bucket-style object
//! store addressed by colon-delimited, prefix-sortable keys:
//!
//! | Purpose | Key |
//! |---|---|
//! | Attribution fragment | `[<ns>:]attrs:<docid>:<timestamp>` |
//! | Version snapshot | `[<ns>:]version:<docid>:<timestamp>` |
//!
//! Timestamps are unix milliseconds rendered as fixed-width decimals, so
//! lexicographic key order is temporal order.
//!
//! # Storage Backends
//!
//! All backends implement the async [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one directory per bucket, one file per object
//!
//! # Design Rules
//!
//! 1. The store never interprets object contents.
//! 2. `list_prefix` returns keys in ascending lexicographic order.
//! 3. `delete_many` is idempotent: deleting a missing key is not an error.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod keys;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use keys::{DocId, KeyScheme, ObjectClass, Timestamp};
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;
