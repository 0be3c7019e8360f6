//! Filesystem-backed blob store: one directory per bucket, one file per key.
//!
//! Keys are escaped into file names (every byte outside `[A-Za-z0-9_-]`
//! becomes `%XX`), so colons and dots never reach the filesystem. An escaped
//! name longer than [`MAX_COMPONENT`] bytes is split into nested directories,
//! each named after one chunk plus a trailing `+`; the last chunk is the file.
//! `+` never appears in an escaped name, so such directories can't collide
//! with objects. Writes go to a dot-prefixed temporary file in the target
//! directory and are renamed into place, which keeps `put` atomic for
//! concurrent readers. Listing skips dot-prefixed entries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Longest escaped chunk stored in one path component, leaving room under
/// the usual 255-byte `NAME_MAX` for the temporary-file prefix.
pub const MAX_COMPONENT: usize = 200;

const CONTINUATION: char = '+';

/// Blob store persisting each object as a file under `<root>/<bucket>/`.
#[derive(Debug)]
pub struct FsBlobStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FsBlobStore {
    /// Open (creating if necessary) the bucket directory.
    pub async fn open(root: impl AsRef<Path>, bucket: &str) -> StoreResult<Self> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(StoreError::InvalidKey {
                key: bucket.to_string(),
                reason: "bucket must be a plain, non-hidden directory name".into(),
            });
        }
        let dir = root.as_ref().join(bucket);
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened filesystem bucket");
        Ok(Self {
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Directory holding the bucket's objects.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(relative_path(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key);
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key does not map to a file".into(),
            });
        };
        if parent != self.dir.as_path() {
            fs::create_dir_all(parent).await?;
        }
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = parent.join(format!(".tmp-{n}-{}", name.to_string_lossy()));
        fs::write(&tmp, &data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        // (directory, escaped name accumulated from the chunks above it)
        let mut stack = vec![(self.dir.clone(), String::new())];
        while let Some((dir, head)) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && !head.is_empty() => {
                    continue
                }
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                if let Some(chunk) = name.strip_suffix(CONTINUATION) {
                    if entry.file_type().await?.is_dir() {
                        stack.push((entry.path(), format!("{head}{chunk}")));
                    }
                    continue;
                }
                let Some(key) = unescape_key(&format!("{head}{name}")) else {
                    continue;
                };
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Path of `key` relative to the bucket directory.
fn relative_path(key: &str) -> PathBuf {
    let name = escape_key(key);
    let mut path = PathBuf::new();
    // Escaped names are ASCII, so any byte offset is a char boundary.
    let mut rest = name.as_str();
    while rest.len() > MAX_COMPONENT {
        let (chunk, tail) = rest.split_at(MAX_COMPONENT);
        path.push(format!("{chunk}{CONTINUATION}"));
        rest = tail;
    }
    path.push(rest);
    path
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
