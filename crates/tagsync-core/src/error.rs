//! Error types for tagsync-core

use std::path::PathBuf;

/// Result type for tagsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tagsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Desired state has a duplicate path, a path rejected by the validity
    /// predicate, or a path that would overwrite an untracked file
    #[error("Path collision at {path}: {reason}")]
    PathCollision { path: String, reason: String },

    /// A desired entry has a malformed content hash or tag, or a tag
    /// references a picture blob that is not stored
    #[error("Invalid desired entry {path}: {reason}")]
    InvalidEntry { path: String, reason: String },

    /// Content hash multisets of current and desired states differ
    #[error(
        "Content set mismatch: {} hash(es) missing from desired state, {} unexpected",
        missing.len(),
        unexpected.len()
    )]
    ContentSetMismatch {
        /// Hashes present in the current state but not in the desired one
        missing: Vec<String>,
        /// Hashes present in the desired state but not in the current one
        unexpected: Vec<String>,
    },

    /// A metadata rewrite did not read back as written
    #[error("Tags of {path} did not read back as written: expected {expected:?}, got {actual:?}")]
    TagRoundTrip {
        path: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Filesystem operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A frame snapshot string could not be parsed
    #[error("Malformed frame snapshot {snapshot:?}: {message}")]
    FrameSyntax { snapshot: String, message: String },

    /// The tag codec rejected a file or a tag set
    #[error("Tag codec error at {path}: {message}")]
    Codec { path: PathBuf, message: String },

    /// Operation referenced a path the collection does not track
    #[error("Not tracked by the collection: {path}")]
    NotTracked { path: String },

    /// A tag references an auxiliary blob that is not in the blob store
    #[error("Blob not found in store: {name}")]
    BlobMissing { name: String },

    /// Filesystem error from tagsync-fs
    #[error(transparent)]
    Fs(#[from] tagsync_fs::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn collision(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathCollision {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_entry(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was raised before any file was touched.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::PathCollision { .. }
                | Self::InvalidEntry { .. }
                | Self::ContentSetMismatch { .. }
        )
    }
}
