//! Identifier space of a replicated document.
//!
//! Every unit of content (one character) is named by an [`Identifier`]: the
//! client that created it plus that client's clock at creation time. Runs of
//! identifiers from one client are described by [`IdRange`], and arbitrary
//! collections by the normalized [`IdSet`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Names one unit of content in a replicated document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    /// The client (replica) that created the content.
    pub client: u64,
    /// Logical clock of the client at creation time.
    pub clock: u64,
}

impl Identifier {
    pub const fn new(client: u64, clock: u64) -> Self {
        Self { client, clock }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.client, self.clock)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.client, self.clock)
    }
}

/// Contiguous run of identifiers from one client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    pub client: u64,
    pub start: u64,
    pub len: u64,
}

impl IdRange {
    pub const fn new(client: u64, start: u64, len: u64) -> Self {
        Self { client, start, len }
    }

    /// Exclusive end clock.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.len)
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        id.client == self.client && id.clock >= self.start && id.clock < self.end()
    }
}

/// Normalized set of identifiers.
///
/// Ranges are kept per client, sorted by start clock, non-overlapping and
/// coalesced (two adjacent ranges are always merged). Two sets containing the
/// same identifiers therefore compare equal structurally.
///
/// Decoding rejects empty or inverted `(start, end)` pairs and re-normalizes
/// the rest, so a decoded set upholds the same invariants as a built one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIdSet", into = "RawIdSet")]
pub struct IdSet {
    clients: BTreeMap<u64, Vec<(u64, u64)>>,
}

/// Wire form of [`IdSet`], trusted only after validation.
#[derive(Serialize, Deserialize)]
struct RawIdSet {
    clients: BTreeMap<u64, Vec<(u64, u64)>>,
}

impl TryFrom<RawIdSet> for IdSet {
    type Error = String;

    fn try_from(raw: RawIdSet) -> Result<Self, Self::Error> {
        let mut set = IdSet::new();
        for (client, ranges) in raw.clients {
            for (start, end) in ranges {
                if end <= start {
                    return Err(format!("invalid id range {start}..{end} for client {client}"));
                }
                set.insert(client, start, end - start);
            }
        }
        Ok(set)
    }
}

impl From<IdSet> for RawIdSet {
    fn from(set: IdSet) -> Self {
        Self {
            clients: set.clients,
        }
    }
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Total number of identifiers in the set.
    pub fn len(&self) -> u64 {
        self.clients
            .values()
            .flat_map(|ranges| ranges.iter())
            .map(|(start, end)| end - start)
            .sum()
    }

    /// Add the identifiers `start .. start + len` of `client`.
    pub fn insert(&mut self, client: u64, start: u64, len: u64) {
        if len == 0 {
            return;
        }
        let end = start.saturating_add(len);
        let ranges = self.clients.entry(client).or_default();

        // First range that overlaps or touches the new one.
        let first = ranges.partition_point(|&(_, e)| e < start);
        let mut last = first;
        let mut merged = (start, end);
        while last < ranges.len() && ranges[last].0 <= end {
            merged.0 = merged.0.min(ranges[last].0);
            merged.1 = merged.1.max(ranges[last].1);
            last += 1;
        }
        ranges.splice(first..last, [merged]);
    }

    pub fn insert_range(&mut self, range: IdRange) {
        self.insert(range.client, range.start, range.len);
    }

    pub fn insert_id(&mut self, id: Identifier) {
        self.insert(id.client, id.clock, 1);
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        let Some(ranges) = self.clients.get(&id.client) else {
            return false;
        };
        let idx = ranges.partition_point(|&(_, e)| e <= id.clock);
        ranges
            .get(idx)
            .is_some_and(|&(s, e)| s <= id.clock && id.clock < e)
    }

    /// Union `other` into this set.
    pub fn merge(&mut self, other: &IdSet) {
        for range in other.ranges() {
            self.insert_range(range);
        }
    }

    /// Union of all `sets`.
    pub fn merge_all<'a>(sets: impl IntoIterator<Item = &'a IdSet>) -> IdSet {
        let mut out = IdSet::new();
        for set in sets {
            out.merge(set);
        }
        out
    }

    /// Iterate the normalized ranges, ordered by client then start clock.
    pub fn ranges(&self) -> impl Iterator<Item = IdRange> + '_ {
        self.clients.iter().flat_map(|(&client, ranges)| {
            ranges
                .iter()
                .map(move |&(start, end)| IdRange::new(client, start, end - start))
        })
    }

    /// Clients with at least one identifier in the set.
    pub fn clients(&self) -> impl Iterator<Item = u64> + '_ {
        self.clients.keys().copied()
    }
}

impl FromIterator<IdRange> for IdSet {
    fn from_iter<I: IntoIterator<Item = IdRange>>(iter: I) -> Self {
        let mut set = IdSet::new();
        for range in iter {
            set.insert_range(range);
        }
        set
    }
}
