//! Sequence CRDT that materializes updates into text.
//!
//! Every character is a node whose parent is its origin (the character it was
//! inserted after). Siblings are ordered by descending `(clock, client)`, and
//! the document order is the pre-order walk of the resulting tree. Clocks are
//! Lamport clocks: a local insert always takes a clock greater than any clock
//! the document has seen, so it lands directly after its origin.
//!
//! Integration is idempotent and independent of arrival order. A character
//! whose origin has not arrived yet is parked under that origin and
//! integrated, together with everything parked behind it, once the origin
//! shows up. Each character is therefore integrated at most once regardless
//! of how the blocks of an update are ordered.

use std::collections::HashMap;

use crate::error::{DocError, DocResult};
use crate::id::{IdSet, Identifier};
use crate::update::{Block, Update};

struct Node {
    origin: Option<Identifier>,
    ch: char,
    children: Vec<Identifier>,
}

/// A replicated text document.
pub struct Document {
    client: u64,
    nodes: HashMap<Identifier, Node>,
    roots: Vec<Identifier>,
    deleted: IdSet,
    /// Parked characters, keyed by the origin they are waiting for.
    pending: HashMap<Identifier, Vec<(Identifier, char)>>,
    max_clock: Option<u64>,
}

fn sibling_key(id: &Identifier) -> (u64, u64) {
    (id.clock, id.client)
}

impl Document {
    /// Create an empty document editing as `client`.
    pub fn new(client: u64) -> Self {
        Self {
            client,
            nodes: HashMap::new(),
            roots: Vec::new(),
            deleted: IdSet::new(),
            pending: HashMap::new(),
            max_clock: None,
        }
    }

    /// Materialize a document from an encoded snapshot (or any update).
    pub fn from_snapshot(data: &[u8]) -> DocResult<Self> {
        let mut doc = Self::new(0);
        doc.apply_update(data)?;
        Ok(doc)
    }

    pub fn client(&self) -> u64 {
        self.client
    }

    /// Decode and integrate an encoded update.
    pub fn apply_update(&mut self, data: &[u8]) -> DocResult<()> {
        let update = Update::decode(data)?;
        self.apply(&update);
        Ok(())
    }

    /// Integrate a decoded update.
    pub fn apply(&mut self, update: &Update) {
        for block in &update.blocks {
            for (id, origin, ch) in block.chars() {
                self.integrate(id, origin, ch);
            }
        }
        for range in update.deletes.ranges() {
            self.observe_clock(range.end() - 1);
        }
        self.deleted.merge(&update.deletes);
    }

    /// Insert `text` so that it starts at visible position `index`.
    ///
    /// Returns the update describing the edit, already applied locally.
    pub fn insert(&mut self, index: usize, text: &str) -> DocResult<Update> {
        let visible = self.visible_ids();
        if index > visible.len() {
            return Err(DocError::IndexOutOfBounds {
                index,
                len: visible.len(),
            });
        }
        if text.is_empty() {
            return Ok(Update::default());
        }
        let origin = index.checked_sub(1).map(|i| visible[i]);
        let id = Identifier::new(self.client, self.next_clock());
        let update = Update::new(vec![Block::new(id, origin, text)], IdSet::new());
        self.apply(&update);
        Ok(update)
    }

    /// Delete `len` visible characters starting at `index`.
    pub fn delete(&mut self, index: usize, len: usize) -> DocResult<Update> {
        let visible = self.visible_ids();
        let end = index.saturating_add(len);
        if end > visible.len() {
            return Err(DocError::IndexOutOfBounds {
                index: end,
                len: visible.len(),
            });
        }
        let mut deletes = IdSet::new();
        for id in &visible[index..end] {
            deletes.insert_id(*id);
        }
        let update = Update::new(Vec::new(), deletes);
        self.apply(&update);
        Ok(update)
    }

    /// Visible text.
    pub fn text(&self) -> String {
        self.visible().into_iter().map(|(_, ch)| ch).collect()
    }

    /// Number of visible characters.
    pub fn len(&self) -> usize {
        self.visible_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the character `id` has been integrated (visible or not).
    pub fn contains(&self, id: &Identifier) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_deleted(&self, id: &Identifier) -> bool {
        self.deleted.contains(id)
    }

    /// Visible characters in document order.
    pub fn visible(&self) -> Vec<(Identifier, char)> {
        self.order()
            .into_iter()
            .filter(|id| !self.deleted.contains(id))
            .filter_map(|id| self.nodes.get(&id).map(|node| (id, node.ch)))
            .collect()
    }

    fn visible_ids(&self) -> Vec<Identifier> {
        self.order()
            .into_iter()
            .filter(|id| !self.deleted.contains(id))
            .collect()
    }

    /// Full state as one update: every block and every deletion seen so far.
    pub fn state_update(&self) -> Update {
        let mut blocks: Vec<Block> = Vec::new();
        let mut run_end: Option<Identifier> = None;
        for id in self.order() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let extends_run = run_end.is_some_and(|prev| {
                prev.client == id.client && prev.clock + 1 == id.clock && node.origin == Some(prev)
            });
            match blocks.last_mut() {
                Some(last) if extends_run => last.content.push(node.ch),
                _ => blocks.push(Block::new(id, node.origin, node.ch.to_string())),
            }
            run_end = Some(id);
        }
        let mut parked: Vec<Block> = self
            .pending
            .iter()
            .flat_map(|(origin, waiting)| {
                waiting
                    .iter()
                    .map(|&(id, ch)| Block::new(id, Some(*origin), ch.to_string()))
            })
            .collect();
        parked.sort_by_key(|block| block.id);
        blocks.extend(parked);
        Update::new(blocks, self.deleted.clone())
    }

    /// Encode the full state as a snapshot.
    pub fn encode_state(&self) -> DocResult<Vec<u8>> {
        self.state_update().encode()
    }

    /// Integrate one character, or park it when its origin is unknown.
    /// Characters parked behind it are integrated as soon as it lands.
    fn integrate(&mut self, id: Identifier, origin: Option<Identifier>, ch: char) {
        let mut ready = vec![(id, origin, ch)];
        while let Some((id, origin, ch)) = ready.pop() {
            if self.nodes.contains_key(&id) {
                continue;
            }
            if let Some(parent) = origin {
                if !self.nodes.contains_key(&parent) {
                    self.park(parent, id, ch);
                    continue;
                }
            }
            let siblings = match origin {
                None => &mut self.roots,
                Some(parent) => match self.nodes.get_mut(&parent) {
                    Some(node) => &mut node.children,
                    None => continue,
                },
            };
            let key = sibling_key(&id);
            let pos = siblings.partition_point(|sibling| sibling_key(sibling) > key);
            siblings.insert(pos, id);
            self.nodes.insert(
                id,
                Node {
                    origin,
                    ch,
                    children: Vec::new(),
                },
            );
            self.observe_clock(id.clock);
            if let Some(waiting) = self.pending.remove(&id) {
                ready.extend(waiting.into_iter().map(|(child, ch)| (child, Some(id), ch)));
            }
        }
    }

    fn park(&mut self, origin: Identifier, id: Identifier, ch: char) {
        let waiting = self.pending.entry(origin).or_default();
        if !waiting.iter().any(|(parked, _)| *parked == id) {
            waiting.push((id, ch));
        }
    }

    /// Number of characters waiting for an origin that has not arrived.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    fn observe_clock(&mut self, clock: u64) {
        self.max_clock = Some(self.max_clock.map_or(clock, |c| c.max(clock)));
    }

    fn next_clock(&self) -> u64 {
        self.max_clock.map_or(0, |c| c + 1)
    }

    fn order(&self) -> Vec<Identifier> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<Identifier> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("client", &self.client)
            .field("nodes", &self.nodes.len())
            .field("pending", &self.pending_len())
            .finish()
    }
}
