//! Attribute maps: identifier ranges tagged with attribution items.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{self, ATTRS_MAGIC};
use crate::error::{DocError, DocResult};
use crate::id::{IdRange, IdSet, Identifier};

/// Item name recording who inserted a range.
pub const INSERT: &str = "insert";
/// Item name recording when a range was inserted.
pub const INSERT_AT: &str = "insertAt";
/// Item name recording who deleted a range.
pub const DELETE: &str = "delete";
/// Item name recording when a range was deleted.
pub const DELETE_AT: &str = "deleteAt";
/// Prefix applied to caller-supplied tag names.
pub const CUSTOM_PREFIX: char = '_';

/// A single `name = value` tag attached to a range.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributionItem {
    pub name: String,
    pub value: String,
}

impl AttributionItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn insert(user: impl Into<String>) -> Self {
        Self::new(INSERT, user)
    }

    pub fn insert_at(timestamp: u64) -> Self {
        Self::new(INSERT_AT, timestamp.to_string())
    }

    pub fn delete(user: impl Into<String>) -> Self {
        Self::new(DELETE, user)
    }

    pub fn delete_at(timestamp: u64) -> Self {
        Self::new(DELETE_AT, timestamp.to_string())
    }

    /// Caller-supplied tag; stored as `_<key>`.
    pub fn custom(key: &str, value: impl Into<String>) -> Self {
        Self::new(format!("{CUSTOM_PREFIX}{key}"), value)
    }

    pub fn is_custom(&self) -> bool {
        self.name.starts_with(CUSTOM_PREFIX)
    }

    fn rank(&self) -> u8 {
        match self.name.as_str() {
            INSERT => 0,
            INSERT_AT => 1,
            DELETE => 2,
            DELETE_AT => 3,
            _ => 4,
        }
    }
}

/// Canonical order: built-in tags first (`insert`, `insertAt`, `delete`,
/// `deleteAt`), then every other name lexicographically, ties by value.
impl Ord for AttributionItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for AttributionItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One contiguous clock range of a client with its attribution set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Segment {
    start: u64,
    end: u64,
    items: Vec<AttributionItem>,
}

/// A range of the identifier space together with the items attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributedRange<'a> {
    pub range: IdRange,
    pub items: &'a [AttributionItem],
}

/// Mapping from identifier ranges to ordered sets of attribution items.
///
/// The representation is canonical: per client, segments are sorted,
/// non-overlapping, never empty of items, and adjacent segments carrying the
/// same item set are coalesced. Structural equality is therefore semantic
/// equality, which is what makes the merge laws testable with `==`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    clients: BTreeMap<u64, Vec<Segment>>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Attach `items` to every identifier of `set`.
    pub fn from_id_set(set: &IdSet, items: &[AttributionItem]) -> Self {
        let mut map = Self::new();
        for range in set.ranges() {
            map.insert_range(range, items);
        }
        map
    }

    /// Attach `items` to `range`, unioning with whatever is already there.
    pub fn insert_range(&mut self, range: IdRange, items: &[AttributionItem]) {
        if range.len == 0 || items.is_empty() {
            return;
        }
        let items = canonical(items.to_vec());
        let segments = self.clients.entry(range.client).or_default();
        let (start, end) = (range.start, range.end());

        let old = std::mem::take(segments);
        let mut out = Vec::with_capacity(old.len() + 2);
        let mut cursor = start;
        for seg in old {
            if seg.end <= start || seg.start >= end {
                if seg.start >= end && cursor < end {
                    out.push(Segment {
                        start: cursor,
                        end,
                        items: items.clone(),
                    });
                    cursor = end;
                }
                out.push(seg);
                continue;
            }
            if seg.start < start {
                out.push(Segment {
                    start: seg.start,
                    end: start,
                    items: seg.items.clone(),
                });
            }
            let overlap_start = seg.start.max(start);
            let overlap_end = seg.end.min(end);
            if cursor < overlap_start {
                out.push(Segment {
                    start: cursor,
                    end: overlap_start,
                    items: items.clone(),
                });
            }
            out.push(Segment {
                start: overlap_start,
                end: overlap_end,
                items: union(&seg.items, &items),
            });
            cursor = overlap_end;
            if seg.end > end {
                out.push(Segment {
                    start: end,
                    end: seg.end,
                    items: seg.items,
                });
            }
        }
        if cursor < end {
            out.push(Segment {
                start: cursor,
                end,
                items,
            });
        }
        *segments = coalesce(out);
    }

    /// Fold `other` into this map.
    pub fn merge(&mut self, other: &AttributeMap) {
        for attributed in other.iter() {
            self.insert_range(attributed.range, attributed.items);
        }
    }

    /// Merge every map in `maps` into a fresh map.
    pub fn merge_all<'a>(maps: impl IntoIterator<Item = &'a AttributeMap>) -> AttributeMap {
        let mut out = AttributeMap::new();
        for map in maps {
            out.merge(map);
        }
        out
    }

    /// Items attached to `id`, if any.
    pub fn attributions(&self, id: &Identifier) -> Option<&[AttributionItem]> {
        let segments = self.clients.get(&id.client)?;
        let idx = segments.partition_point(|s| s.end <= id.clock);
        segments
            .get(idx)
            .filter(|s| s.start <= id.clock)
            .map(|s| s.items.as_slice())
    }

    /// Iterate attributed ranges, ordered by client then clock.
    pub fn iter(&self) -> impl Iterator<Item = AttributedRange<'_>> + '_ {
        self.clients.iter().flat_map(|(&client, segments)| {
            segments.iter().map(move |s| AttributedRange {
                range: IdRange::new(client, s.start, s.end - s.start),
                items: &s.items,
            })
        })
    }

    /// Attributed ranges of a single client.
    pub fn client_ranges(&self, client: u64) -> Vec<AttributedRange<'_>> {
        self.clients
            .get(&client)
            .map(|segments| {
                segments
                    .iter()
                    .map(|s| AttributedRange {
                        range: IdRange::new(client, s.start, s.end - s.start),
                        items: &s.items,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clients(&self) -> impl Iterator<Item = u64> + '_ {
        self.clients.keys().copied()
    }

    /// Rough in-memory footprint in bytes, used for admission accounting.
    pub fn approx_size(&self) -> usize {
        self.clients
            .values()
            .flatten()
            .map(|seg| {
                16 + seg
                    .items
                    .iter()
                    .map(|item| item.name.len() + item.value.len() + 8)
                    .sum::<usize>()
            })
            .sum()
    }

    /// The identifiers covered by this map.
    pub fn id_set(&self) -> IdSet {
        self.iter().map(|a| a.range).collect()
    }

    pub fn encode(&self) -> DocResult<Vec<u8>> {
        codec::encode(ATTRS_MAGIC, self)
    }

    /// Decode and re-normalize, so a map written by an older encoder is
    /// still canonical after reading. Empty or inverted segments and segments
    /// without items are rejected.
    pub fn decode(data: &[u8]) -> DocResult<Self> {
        let raw: AttributeMap = codec::decode(ATTRS_MAGIC, data)?;
        for (client, segments) in &raw.clients {
            for seg in segments {
                if seg.end <= seg.start {
                    return Err(DocError::Decode(format!(
                        "invalid segment {}..{} for client {client}",
                        seg.start, seg.end
                    )));
                }
                if seg.items.is_empty() {
                    return Err(DocError::Decode(format!(
                        "segment {}..{} for client {client} has no items",
                        seg.start, seg.end
                    )));
                }
            }
        }
        Ok(AttributeMap::merge_all([&raw]))
    }
}

fn canonical(mut items: Vec<AttributionItem>) -> Vec<AttributionItem> {
    items.sort();
    items.dedup();
    items
}

fn union(a: &[AttributionItem], b: &[AttributionItem]) -> Vec<AttributionItem> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    canonical(out)
}

fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match out.last_mut() {
            Some(last) if last.end == seg.start && last.items == seg.items => last.end = seg.end,
            _ => out.push(seg),
        }
    }
    out
}
