//! The update wire format.
//!
//! An [`Update`] carries newly inserted content as [`Block`]s plus a set of
//! deleted identifiers. The same format encodes incremental edits and full
//! snapshots: a snapshot is simply an update containing every block and every
//! deletion a document has seen.

use serde::{Deserialize, Serialize};

use crate::codec::{self, UPDATE_MAGIC};
use crate::error::{DocError, DocResult};
use crate::id::{IdRange, IdSet, Identifier};

/// A run of characters inserted by one client with consecutive clocks.
///
/// Character `k` of the block has identifier `(id.client, id.clock + k)`.
/// The first character is placed after `origin` (or at the document start
/// when `origin` is `None`); every following character is placed after its
/// predecessor in the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Identifier,
    pub origin: Option<Identifier>,
    pub content: String,
}

impl Block {
    pub fn new(id: Identifier, origin: Option<Identifier>, content: impl Into<String>) -> Self {
        Self {
            id,
            origin,
            content: content.into(),
        }
    }

    /// Number of identifiers the block occupies.
    pub fn len(&self) -> u64 {
        self.content.chars().count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn range(&self) -> IdRange {
        IdRange::new(self.id.client, self.id.clock, self.len())
    }

    /// Expand into `(id, origin, char)` triples.
    pub fn chars(&self) -> impl Iterator<Item = (Identifier, Option<Identifier>, char)> + '_ {
        let Block { id, origin, content } = self;
        content.chars().enumerate().map(move |(k, ch)| {
            let k = k as u64;
            let char_id = Identifier::new(id.client, id.clock + k);
            let char_origin = if k == 0 {
                *origin
            } else {
                Some(Identifier::new(id.client, id.clock + k - 1))
            };
            (char_id, char_origin, ch)
        })
    }
}

/// Identifier ranges touched by an update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TouchedRanges {
    pub inserted: IdSet,
    pub deleted: IdSet,
}

impl TouchedRanges {
    /// Everything the update touched, inserted or deleted.
    pub fn all(&self) -> IdSet {
        IdSet::merge_all([&self.inserted, &self.deleted])
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty()
    }
}

/// An edit or a full snapshot of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub blocks: Vec<Block>,
    pub deletes: IdSet,
}

impl Update {
    pub fn new(blocks: Vec<Block>, deletes: IdSet) -> Self {
        Self { blocks, deletes }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.deletes.is_empty()
    }

    pub fn encode(&self) -> DocResult<Vec<u8>> {
        codec::encode(UPDATE_MAGIC, self)
    }

    /// Decode and validate an update.
    pub fn decode(data: &[u8]) -> DocResult<Self> {
        let update: Update = codec::decode(UPDATE_MAGIC, data)?;
        update.validate()?;
        Ok(update)
    }

    fn validate(&self) -> DocResult<()> {
        for block in &self.blocks {
            if block.is_empty() {
                return Err(DocError::Decode(format!("empty block at {}", block.id)));
            }
            if block.id.clock.checked_add(block.len()).is_none() {
                return Err(DocError::Decode(format!("clock overflow in block at {}", block.id)));
            }
            if let Some(origin) = block.origin {
                if block.range().contains(&origin) {
                    return Err(DocError::Decode(format!(
                        "block at {} has an origin inside itself",
                        block.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Identifier ranges inserted and deleted by this update.
    pub fn touched_ranges(&self) -> TouchedRanges {
        TouchedRanges {
            inserted: self.blocks.iter().map(Block::range).collect(),
            deleted: self.deletes.clone(),
        }
    }
}

/// Decode `data` and report which identifiers it inserts and deletes.
pub fn extract_touched_ranges(data: &[u8]) -> DocResult<TouchedRanges> {
    Ok(Update::decode(data)?.touched_ranges())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn sample_update() -> Update {
        let mut deletes = IdSet::new();
        deletes.insert(3, 0, 2);
        Update::new(
            vec![
                Block::new(Identifier::new(7, 0), None, "hi there"),
                Block::new(Identifier::new(9, 4), Some(Identifier::new(7, 2)), "é!"),
            ],
            deletes,
        )
    }

    #[test]
    fn block_chars_chain_origins() {
        let block = Block::new(Identifier::new(1, 10), Some(Identifier::new(2, 0)), "abc");
        let chars: Vec<_> = block.chars().collect();
        assert_eq!(chars[0], (Identifier::new(1, 10), Some(Identifier::new(2, 0)), 'a'));
        assert_eq!(chars[1], (Identifier::new(1, 11), Some(Identifier::new(1, 10)), 'b'));
        assert_eq!(chars[2], (Identifier::new(1, 12), Some(Identifier::new(1, 11)), 'c'));
    }

    #[test]
    fn block_length_counts_chars_not_bytes() {
        let block = Block::new(Identifier::new(1, 0), None, "héllo");
        assert_eq!(block.len(), 5);
    }

    #[test]
    fn touched_ranges_of_update() {
        let touched = extract_touched_ranges(&sample_update().encode().unwrap()).unwrap();
        let inserted: Vec<_> = touched.inserted.ranges().collect();
        assert_eq!(inserted, vec![IdRange::new(7, 0, 8), IdRange::new(9, 4, 2)]);
        let deleted: Vec<_> = touched.deleted.ranges().collect();
        assert_eq!(deleted, vec![IdRange::new(3, 0, 2)]);
        assert_eq!(touched.all().len(), 12);
    }

    #[test]
    fn malformed_update_is_decode_error() {
        assert!(extract_touched_ranges(b"garbage").is_err());
        assert!(extract_touched_ranges(&[]).is_err());
    }

    #[test]
    fn empty_block_rejected() {
        let update = Update::new(vec![Block::new(Identifier::new(1, 0), None, "")], IdSet::new());
        let bytes = update.encode().unwrap();
        assert!(matches!(Update::decode(&bytes), Err(DocError::Decode(_))));
    }

    #[test]
    fn self_referential_origin_rejected() {
        let update = Update::new(
            vec![Block::new(Identifier::new(1, 0), Some(Identifier::new(1, 1)), "ab")],
            IdSet::new(),
        );
        let bytes = update.encode().unwrap();
        assert!(Update::decode(&bytes).is_err());
    }

    /// Same wire shape as `Update`, with deletes written without validation.
    #[derive(Serialize)]
    struct UncheckedUpdate {
        blocks: Vec<Block>,
        deletes: std::collections::BTreeMap<u64, Vec<(u64, u64)>>,
    }

    pub(crate) fn unchecked_deletes(client: u64, start: u64, end: u64) -> Vec<u8> {
        let update = UncheckedUpdate {
            blocks: Vec::new(),
            deletes: [(client, vec![(start, end)])].into_iter().collect(),
        };
        codec::encode(UPDATE_MAGIC, &update).unwrap()
    }

    #[test]
    fn inverted_delete_range_is_decode_error() {
        let bytes = unchecked_deletes(1, 5, 2);
        assert!(matches!(extract_touched_ranges(&bytes), Err(DocError::Decode(_))));
        let bytes = unchecked_deletes(1, 3, 3);
        assert!(matches!(Update::decode(&bytes), Err(DocError::Decode(_))));
    }

    #[test]
    fn well_formed_unchecked_deletes_decode() {
        let touched = extract_touched_ranges(&unchecked_deletes(4, 2, 5)).unwrap();
        assert_eq!(touched.deleted.ranges().collect::<Vec<_>>(), vec![IdRange::new(4, 2, 3)]);
    }

    #[test]
    fn attribute_map_bytes_are_not_an_update() {
        let bytes = crate::AttributeMap::new().encode().unwrap();
        assert!(matches!(Update::decode(&bytes), Err(DocError::BadMagic { .. })));
    }
}
