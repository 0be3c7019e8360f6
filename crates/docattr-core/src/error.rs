use docattr_doc::DocError;
use docattr_store::{DocId, StoreError, Timestamp};

/// Errors produced by the attribution pipeline and the version chain.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed update, snapshot or stored attribute map.
    #[error("document error: {0}")]
    Doc(#[from] DocError),

    /// Blob store I/O failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The requested version snapshot does not exist.
    #[error("version {timestamp} of {docid} not found")]
    VersionNotFound { docid: DocId, timestamp: Timestamp },
}

impl CoreError {
    /// `true` for errors caused by malformed input rather than I/O.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Doc(_))
    }
}

/// Result alias for pipeline operations.
pub type CoreResult<T> = Result<T, CoreError>;
