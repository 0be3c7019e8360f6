//! Object key scheme and document id validation.
//!
//! Valid document ids:
//! - Must be non-empty and at most [`MAX_DOCID_LEN`] bytes
//! - Must not contain `:`, `/`, `\`, whitespace or control characters
//!
//! The `:` rule is what makes prefix listing exact: `attrs:d1:` can never
//! match keys that belong to `d10` or to an id containing the delimiter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// Longest accepted document id, in bytes.
pub const MAX_DOCID_LEN: usize = 255;

/// Width of the zero-padded timestamp suffix (digits of `u64::MAX`).
pub const TIMESTAMP_WIDTH: usize = 20;

const KEY_DELIMITER: char = ':';
const FORBIDDEN_CHARS: &[char] = &[KEY_DELIMITER, '/', '\\'];

/// Validated, caller-assigned document identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> StoreResult<Self> {
        let id = id.into();
        validate_docid(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_docid(id: &str) -> StoreResult<()> {
    let reject = |reason: String| StoreError::InvalidDocId {
        docid: id.to_string(),
        reason,
    };
    if id.is_empty() {
        return Err(reject("must not be empty".into()));
    }
    if id.len() > MAX_DOCID_LEN {
        return Err(reject(format!("longer than {MAX_DOCID_LEN} bytes")));
    }
    if let Some(ch) = id
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_whitespace() || c.is_control())
    {
        return Err(reject(format!("contains forbidden character {ch:?}")));
    }
    Ok(())
}

impl TryFrom<String> for DocId {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl std::str::FromStr for DocId {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two families of objects kept per document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    /// Encoded attribute map, compacted over time.
    Attribution,
    /// Full document snapshot, append-only.
    Version,
}

impl ObjectClass {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Attribution => "attrs",
            Self::Version => "version",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Builds and parses object keys, optionally under a namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyScheme {
    namespace: Option<String>,
}

impl KeyScheme {
    /// Keys without a namespace: `attrs:<docid>:<ts>`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys under `namespace`: `<namespace>:attrs:<docid>:<ts>`.
    pub fn with_namespace(namespace: impl Into<String>) -> StoreResult<Self> {
        let namespace = namespace.into();
        if namespace.is_empty()
            || namespace.ends_with(KEY_DELIMITER)
            || namespace.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(StoreError::InvalidKey {
                key: namespace,
                reason: "namespace must be non-empty, without whitespace or a trailing ':'".into(),
            });
        }
        Ok(Self {
            namespace: Some(namespace),
        })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Prefix shared by every object of `class` for `docid`, delimiter
    /// included.
    pub fn prefix(&self, class: ObjectClass, docid: &DocId) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{class}:{docid}:"),
            None => format!("{class}:{docid}:"),
        }
    }

    pub fn key(&self, class: ObjectClass, docid: &DocId, timestamp: Timestamp) -> String {
        format!(
            "{}{timestamp:0width$}",
            self.prefix(class, docid),
            width = TIMESTAMP_WIDTH
        )
    }

    /// Recover the timestamp suffix of a key. Unpadded suffixes are accepted.
    pub fn parse_timestamp(key: &str) -> StoreResult<Timestamp> {
        let suffix = key
            .rsplit_once(KEY_DELIMITER)
            .map(|(_, suffix)| suffix)
            .ok_or_else(|| StoreError::InvalidKey {
                key: key.to_string(),
                reason: "missing timestamp suffix".into(),
            })?;
        suffix.parse().map_err(|_| StoreError::InvalidKey {
            key: key.to_string(),
            reason: format!("timestamp suffix {suffix:?} is not a decimal integer"),
        })
    }
}
