//! Document diff: the delta that turns one document state into another.
//!
//! Deltas use the familiar retain/insert/delete operation list over visible
//! text. Characters are matched by identifier rather than by content, so two
//! snapshots of the same replicated document diff exactly along the edits
//! that separate them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DocError, DocResult};
use crate::id::Identifier;

/// A single delta operation over visible text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    /// Keep the next `n` characters.
    Retain(u64),
    /// Insert text at the current position.
    Insert(String),
    /// Remove the next `n` characters.
    Delete(u64),
}

/// Ordered list of operations; serializes as a bare JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta {
    pub ops: Vec<DeltaOp>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if applying the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn retain(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        if let Some(DeltaOp::Retain(last)) = self.ops.last_mut() {
            *last += n;
        } else {
            self.ops.push(DeltaOp::Retain(n));
        }
    }

    pub fn insert(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(DeltaOp::Insert(last)) = self.ops.last_mut() {
            last.push_str(text);
        } else {
            self.ops.push(DeltaOp::Insert(text.to_string()));
        }
    }

    pub fn delete(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        if let Some(DeltaOp::Delete(last)) = self.ops.last_mut() {
            *last += n;
        } else {
            self.ops.push(DeltaOp::Delete(n));
        }
    }

    /// Drop a trailing retain, which carries no information.
    fn chop(mut self) -> Self {
        if matches!(self.ops.last(), Some(DeltaOp::Retain(_))) {
            self.ops.pop();
        }
        self
    }

    /// Number of characters inserted.
    pub fn inserted_len(&self) -> u64 {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Insert(text) => text.chars().count() as u64,
                _ => 0,
            })
            .sum()
    }

    /// Number of characters deleted.
    pub fn deleted_len(&self) -> u64 {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Delete(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Apply the delta to `text`.
    pub fn apply_to(&self, text: &str) -> DocResult<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut pos = 0usize;
        for op in &self.ops {
            match op {
                DeltaOp::Retain(n) => {
                    let end = advance(pos, *n, chars.len())?;
                    out.extend(&chars[pos..end]);
                    pos = end;
                }
                DeltaOp::Insert(inserted) => out.push_str(inserted),
                DeltaOp::Delete(n) => pos = advance(pos, *n, chars.len())?,
            }
        }
        out.extend(&chars[pos..]);
        Ok(out)
    }
}

fn advance(pos: usize, n: u64, len: usize) -> DocResult<usize> {
    let end = pos.saturating_add(usize::try_from(n).unwrap_or(usize::MAX));
    if end > len {
        return Err(DocError::IndexOutOfBounds { index: end, len });
    }
    Ok(end)
}

/// Compute the delta transforming the visible text of `from` into `to`.
pub fn diff(from: &Document, to: &Document) -> Delta {
    let old = from.visible();
    let new = to.visible();
    let position: HashMap<Identifier, usize> =
        old.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();

    let mut delta = Delta::new();
    let mut i = 0usize;
    let mut buf = [0u8; 4];
    for (id, ch) in &new {
        match position.get(id) {
            Some(&k) if k >= i => {
                delta.delete((k - i) as u64);
                delta.retain(1);
                i = k + 1;
            }
            _ => delta.insert(ch.encode_utf8(&mut buf)),
        }
    }
    delta.delete((old.len() - i) as u64);
    delta.chop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_from_empty_is_full_insert() {
        let mut doc = Document::new(1);
        doc.insert(0, "hello").unwrap();
        let delta = diff(&Document::new(0), &doc);
        assert_eq!(delta.ops, vec![DeltaOp::Insert("hello".into())]);
    }

    #[test]
    fn diff_of_identical_documents_is_empty() {
        let mut doc = Document::new(1);
        doc.insert(0, "same").unwrap();
        let copy = Document::from_snapshot(&doc.encode_state().unwrap()).unwrap();
        assert!(diff(&doc, &copy).is_empty());
    }

    #[test]
    fn diff_append() {
        let mut doc = Document::new(1);
        doc.insert(0, "hello").unwrap();
        let before = Document::from_snapshot(&doc.encode_state().unwrap()).unwrap();
        doc.insert(5, "world!").unwrap();
        let delta = diff(&before, &doc);
        assert_eq!(
            delta.ops,
            vec![DeltaOp::Retain(5), DeltaOp::Insert("world!".into())]
        );
    }

    #[test]
    fn diff_with_deletes_and_inserts() {
        let mut doc = Document::new(1);
        doc.insert(0, "hello world").unwrap();
        let before = Document::from_snapshot(&doc.encode_state().unwrap()).unwrap();
        doc.delete(0, 1).unwrap();
        doc.insert(0, "J").unwrap();
        doc.delete(5, 6).unwrap();
        assert_eq!(doc.text(), "Jello");

        let delta = diff(&before, &doc);
        assert_eq!(
            delta.ops,
            vec![
                DeltaOp::Insert("J".into()),
                DeltaOp::Delete(1),
                DeltaOp::Retain(4),
                DeltaOp::Delete(6),
            ]
        );
        assert_eq!(delta.apply_to(&before.text()).unwrap(), "Jello");
    }

    #[test]
    fn json_shape() {
        let delta = Delta {
            ops: vec![
                DeltaOp::Retain(2),
                DeltaOp::Insert("ab".into()),
                DeltaOp::Delete(1),
            ],
        };
        assert_eq!(
            serde_json::to_value(&delta).unwrap(),
            json!([{"retain": 2}, {"insert": "ab"}, {"delete": 1}])
        );
    }

    #[test]
    fn apply_rejects_overrun() {
        let delta = Delta {
            ops: vec![DeltaOp::Retain(10)],
        };
        assert!(delta.apply_to("short").is_err());
    }

    #[test]
    fn builder_coalesces_ops() {
        let mut delta = Delta::new();
        delta.retain(1);
        delta.retain(2);
        delta.insert("a");
        delta.insert("b");
        delta.delete(0);
        assert_eq!(
            delta.ops,
            vec![DeltaOp::Retain(3), DeltaOp::Insert("ab".into())]
        );
        assert_eq!(delta.inserted_len(), 2);
        assert_eq!(delta.deleted_len(), 0);
    }
}
