//! Per-file snapshots and their persistence
//!
//! A collection state is an ordered list of [`FileSnapshot`]s. On disk it is a
//! pretty-printed JSON array sorted by `path`; in memory the collection keeps
//! it keyed by path. [`SnapshotCache`] lets a rescan reuse a previous entry
//! when the file's modification time has not changed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tagsync_fs::{ConfigStore, NormalizedPath};
use tracing::debug;

use crate::blob::BlobStore;
use crate::frame::{same_tag_set, sorted_tags};
use crate::{Error, Result};

/// `modified` value of snapshots that were never observed on disk
pub const UNKNOWN_MODIFIED: i64 = -1;

/// Name of the blob directory inside a snapshot root
pub const PICTURES_DIR: &str = "pictures";

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    /// Collection-relative path, `/`-separated
    pub path: String,
    /// Modification time in nanoseconds since the Unix epoch
    pub modified: i64,
    /// Digest of the payload with all metadata stripped
    pub content_hash: String,
    /// Frame snapshots, canonically sorted
    pub tags: Vec<String>,
}

impl FileSnapshot {
    pub fn new(
        path: impl Into<String>,
        modified: i64,
        content_hash: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            path: path.into(),
            modified,
            content_hash: content_hash.into(),
            tags: sorted_tags(&tags),
        }
    }

    /// Same path, same content and same tag set; `modified` is ignored.
    pub fn same_content_and_labels(&self, other: &FileSnapshot) -> bool {
        self.path == other.path
            && self.content_hash == other.content_hash
            && same_tag_set(&self.tags, &other.tags)
    }
}

/// Sort a state into canonical (path) order.
pub fn canonical_order(mut state: Vec<FileSnapshot>) -> Vec<FileSnapshot> {
    state.sort_by(|a, b| a.path.cmp(&b.path));
    state
}

/// On-disk modification time of `path` in nanoseconds since the Unix epoch.
pub fn modified_of(path: &Path) -> Result<i64> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let mtime = metadata.modified().map_err(|e| Error::io(path, e))?;
    let nanos = match mtime.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    };
    Ok(nanos)
}

/// Persists collection states under a snapshot root directory.
///
/// The root also hosts the auxiliary blob directory (`pictures/`).
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: NormalizedPath,
    blobs: BlobStore,
    config: ConfigStore,
}

impl SnapshotStore {
    /// Open a snapshot root, creating it and its blob directory if needed.
    pub fn open(root: NormalizedPath) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref()).map_err(|e| Error::io(root.to_native(), e))?;
        let blobs = BlobStore::open(root.join(PICTURES_DIR))?;
        Ok(Self {
            root,
            blobs,
            config: ConfigStore::new(),
        })
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Path of a named snapshot file.
    pub fn snapshot_path(&self, name: &str) -> NormalizedPath {
        self.root.join(name)
    }

    /// Save a state in canonical order.
    pub fn save(&self, name: &str, state: &[FileSnapshot]) -> Result<()> {
        let state = canonical_order(state.to_vec());
        let path = self.snapshot_path(name);
        self.config.save(&path, &state)?;
        debug!(path = %path, entries = state.len(), "saved snapshot");
        Ok(())
    }

    /// Load a named snapshot under a shared lock.
    pub fn load(&self, name: &str) -> Result<Vec<FileSnapshot>> {
        let path = self.snapshot_path(name);
        let native = path.to_native();
        let file = File::open(&native).map_err(|e| Error::io(&native, e))?;
        FileExt::lock_shared(&file).map_err(|e| Error::io(&native, e))?;

        // Read through the locked handle
        let mut content = String::new();
        (&file)
            .read_to_string(&mut content)
            .map_err(|e| Error::io(&native, e))?;
        let state: Vec<FileSnapshot> = serde_json::from_str(&content)?;

        debug!(path = %path, entries = state.len(), "loaded snapshot");
        Ok(state)
    }

    /// Load a named snapshot, or `None` if it was never saved.
    pub fn try_load(&self, name: &str) -> Result<Option<Vec<FileSnapshot>>> {
        if !self.snapshot_path(name).is_file() {
            return Ok(None);
        }
        self.load(name).map(Some)
    }
}

/// Previously observed snapshots keyed by path.
///
/// A pure optimization: a miss only costs a rescan of the file.
#[derive(Debug, Default, Clone)]
pub struct SnapshotCache {
    entries: HashMap<String, FileSnapshot>,
}

impl SnapshotCache {
    pub fn new(state: impl IntoIterator<Item = FileSnapshot>) -> Self {
        Self {
            entries: state.into_iter().map(|s| (s.path.clone(), s)).collect(),
        }
    }

    /// Cached snapshot of `path`, only if it was taken at `on_disk_modified`.
    pub fn load_cached(&self, path: &str, on_disk_modified: i64) -> Option<&FileSnapshot> {
        self.entries
            .get(path)
            .filter(|s| s.modified != UNKNOWN_MODIFIED && s.modified == on_disk_modified)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
