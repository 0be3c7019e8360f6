//! Document engine for docattr.
//!
//! This crate owns everything that interprets document bytes: the identifier
//! space of a replicated document, the attribute maps that tag ranges of that
//! space with authorship metadata, the binary update format, a sequence CRDT
//! that materializes updates into text, and the diff that turns two document
//! states into a delta.
//!
//! # Key Types
//!
//! - [`Identifier`] / [`IdRange`] / [`IdSet`] -- identifier space
//! - [`AttributionItem`] / [`AttributeMap`] -- attribution tags per range
//! - [`Update`] / [`Block`] -- the wire format of an edit or a full snapshot
//! - [`Document`] -- sequence CRDT materializing updates into text
//! - [`Delta`] / [`DeltaOp`] -- JSON-serializable difference between documents
//!
//! # Merge Laws
//!
//! [`AttributeMap::merge`] is associative, commutative and idempotent. Items
//! attached to an identifier form a set kept in canonical order, so folding
//! the same map in twice never duplicates an attribution. The compaction
//! pipeline relies on this to tolerate at-least-once writes.

pub mod attr;
pub mod codec;
pub mod delta;
pub mod document;
pub mod error;
pub mod id;
pub mod update;

pub use attr::{AttributeMap, AttributedRange, AttributionItem};
pub use delta::{diff, Delta, DeltaOp};
pub use document::Document;
pub use error::{DocError, DocResult};
pub use id::{IdRange, IdSet, Identifier};
pub use update::{extract_touched_ranges, Block, TouchedRanges, Update};
