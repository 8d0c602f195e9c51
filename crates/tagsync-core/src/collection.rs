//! Collection of tracked media files
//!
//! A [`Collection`] owns the in-memory state of one collection root: the
//! path-keyed snapshot index, the codec used to read and write tags, the
//! content identity scheme, and the blob store used for artwork. It produces
//! the current state by scanning and reorganizes the tree towards a desired
//! state through the rename engine.

use std::collections::BTreeMap;
use std::fs;

use serde::Serialize;
use tagsync_fs::{NormalizedPath, STAGING_DIR, is_acceptable_path};
use tracing::{debug, info, warn};

use crate::blob::{BlobStore, referenced_blobs};
use crate::codec::{HeaderCodec, TagCodec};
use crate::engine::{self, SyncOptions, SyncReport};
use crate::frame::{same_tag_set, sorted_tags};
use crate::identity::{ContentIdentity, StrippedPayloadIdentity};
use crate::snapshot::{FileSnapshot, SnapshotCache, SnapshotStore, modified_of};
use crate::{Error, Result};

/// Predicate deciding whether a desired path is acceptable.
pub type PathPredicate = Box<dyn Fn(&str) -> bool>;

/// Settings of a collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// File extensions (without dot, case-insensitive) that are tracked
    pub extensions: Vec<String>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
        }
    }
}

impl CollectionOptions {
    fn tracks(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
            }
            _ => false,
        }
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Number of tracked files found
    pub scanned: usize,
    /// Files whose snapshot was reused from the cache
    pub cache_hits: usize,
    /// Files skipped because their type is not tracked or their name is
    /// not valid UTF-8
    pub skipped: Vec<String>,
    /// Files left in the staging directory by an interrupted run
    pub stranded: Vec<String>,
}

/// The tracked files under one collection root.
pub struct Collection {
    pub(crate) root: NormalizedPath,
    pub(crate) codec: Box<dyn TagCodec>,
    pub(crate) identity: Box<dyn ContentIdentity>,
    blobs: BlobStore,
    options: CollectionOptions,
    pub(crate) accepts: PathPredicate,
    cache: SnapshotCache,
    pub(crate) entries: BTreeMap<String, FileSnapshot>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Create a collection with an explicit codec and identity scheme.
    ///
    /// The root is canonicalized; the state starts empty until [`scan`](Self::scan).
    pub fn new(
        root: NormalizedPath,
        codec: Box<dyn TagCodec>,
        identity: Box<dyn ContentIdentity>,
        blobs: BlobStore,
        options: CollectionOptions,
    ) -> Result<Self> {
        let canonical =
            dunce::canonicalize(root.as_ref()).map_err(|e| Error::io(root.to_native(), e))?;
        let extensions = options.extensions.clone();
        Ok(Self {
            root: NormalizedPath::new(canonical),
            codec,
            identity,
            blobs,
            options,
            accepts: Box::new(move |path| is_acceptable_path(path, &extensions)),
            cache: SnapshotCache::default(),
            entries: BTreeMap::new(),
        })
    }

    /// Create a collection using [`HeaderCodec`] over the store's blob directory.
    pub fn open(root: NormalizedPath, store: &SnapshotStore, options: CollectionOptions) -> Result<Self> {
        let codec = HeaderCodec::new(store.blobs().clone());
        let identity = StrippedPayloadIdentity::new(codec.clone());
        Self::new(
            root,
            Box::new(codec),
            Box::new(identity),
            store.blobs().clone(),
            options,
        )
    }

    /// Reuse snapshots of a previous state for files whose mtime is unchanged.
    pub fn with_cache(mut self, previous: Vec<FileSnapshot>) -> Self {
        self.cache = SnapshotCache::new(previous);
        self
    }

    /// Replace the predicate that desired paths must satisfy.
    pub fn with_path_predicate(mut self, accepts: impl Fn(&str) -> bool + 'static) -> Self {
        self.accepts = Box::new(accepts);
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Absolute location of a collection-relative path.
    pub fn absolute(&self, relative: &str) -> NormalizedPath {
        self.root.join(relative)
    }

    /// Current state in canonical (path) order.
    pub fn state(&self) -> Vec<FileSnapshot> {
        self.entries.values().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<&FileSnapshot> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk the collection root and rebuild the current state.
    ///
    /// Untracked file types and names that are not valid UTF-8 are reported
    /// and skipped. Files found in the staging directory are reported as
    /// stranded and not tracked.
    pub fn scan(&mut self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let mut files = Vec::new();
        self.walk("", &mut files, &mut report)?;

        let mut entries = BTreeMap::new();
        for (num, relative) in files.iter().enumerate() {
            let absolute = self.absolute(relative);
            let modified = modified_of(absolute.as_ref())?;

            let snapshot = match self.cache.load_cached(relative, modified) {
                Some(cached) => {
                    report.cache_hits += 1;
                    cached.clone()
                }
                None => {
                    debug!(file = %relative, "{}/{}", num + 1, files.len());
                    let content_hash = self.identity.identity(&absolute)?;
                    let tags = self.codec.read(&absolute)?;
                    FileSnapshot::new(relative.clone(), modified, content_hash, tags)
                }
            };
            entries.insert(relative.clone(), snapshot);
        }

        report.scanned = entries.len();
        self.entries = entries;
        self.cache = SnapshotCache::new(self.state());
        info!(
            scanned = report.scanned,
            cache_hits = report.cache_hits,
            skipped = report.skipped.len(),
            "scanned collection"
        );
        Ok(report)
    }

    fn walk(&self, relative: &str, files: &mut Vec<String>, report: &mut ScanReport) -> Result<()> {
        let dir = self.absolute(relative);
        let read = fs::read_dir(dir.as_ref()).map_err(|e| Error::io(dir.to_native(), e))?;
        let mut children = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| Error::io(dir.to_native(), e))?;
            children.push(entry.file_name());
        }
        children.sort();

        for name in children {
            let name = match name.into_string() {
                Ok(name) => name,
                Err(raw) => {
                    let lossy = join_relative(relative, &raw.to_string_lossy());
                    warn!(file = %lossy, "skipping entry with a non UTF-8 name");
                    report.skipped.push(lossy);
                    continue;
                }
            };
            let child = join_relative(relative, &name);
            let absolute = self.absolute(&child);

            if relative.is_empty() && name == STAGING_DIR {
                self.collect_stranded(&absolute, report)?;
                continue;
            }

            if absolute.is_dir() {
                self.walk(&child, files, report)?;
            } else if self.options.tracks(&name) {
                files.push(child);
            } else {
                warn!(file = %absolute, "skipping file of untracked type");
                report.skipped.push(child);
            }
        }
        Ok(())
    }

    fn collect_stranded(&self, staging: &NormalizedPath, report: &mut ScanReport) -> Result<()> {
        let read = fs::read_dir(staging.as_ref()).map_err(|e| Error::io(staging.to_native(), e))?;
        for entry in read {
            let entry = entry.map_err(|e| Error::io(staging.to_native(), e))?;
            match entry.file_name().into_string() {
                Ok(name) => {
                    let name = format!("{STAGING_DIR}/{name}");
                    warn!(file = %name, "stranded file in staging directory; run recovery");
                    report.stranded.push(name);
                }
                Err(raw) => {
                    let lossy = format!("{STAGING_DIR}/{}", raw.to_string_lossy());
                    warn!(file = %lossy, "skipping entry with a non UTF-8 name");
                    report.skipped.push(lossy);
                }
            }
        }
        report.stranded.sort();
        Ok(())
    }

    /// Rewrite the tags of one tracked file and verify they read back.
    pub fn set_tags(&mut self, path: &str, tags: &[String]) -> Result<()> {
        let Some(current) = self.entries.get(path) else {
            return Err(Error::NotTracked {
                path: path.to_string(),
            });
        };
        if same_tag_set(&current.tags, tags) {
            return Ok(());
        }

        let absolute = self.absolute(path);
        let written = write_verified(&*self.codec, &absolute, path, tags)?;
        let modified = modified_of(absolute.as_ref())?;

        if let Some(entry) = self.entries.get_mut(path) {
            entry.tags = written;
            entry.modified = modified;
        }
        debug!(file = %path, "rewrote tags");
        Ok(())
    }

    /// Reorganize the collection to match `desired`.
    ///
    /// See [`engine`](crate::engine) for the protocol and its guarantees.
    pub fn synchronize(&mut self, desired: &[FileSnapshot], options: SyncOptions) -> Result<SyncReport> {
        let mut report = engine::synchronize(self, desired, &options)?;
        if !options.dry_run {
            self.cache = SnapshotCache::new(self.state());
            report.removed_blobs = self.remove_unused_blobs()?;
        }
        Ok(report)
    }

    /// Delete every stored blob that no tag of the current state references.
    pub fn remove_unused_blobs(&self) -> Result<Vec<String>> {
        let referenced = referenced_blobs(self.entries.values())?;
        self.blobs.sweep(&referenced)
    }
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Write `tags` and require that reading them back yields the same set.
pub(crate) fn write_verified(
    codec: &dyn TagCodec,
    absolute: &NormalizedPath,
    relative: &str,
    tags: &[String],
) -> Result<Vec<String>> {
    codec.write(absolute, tags)?;
    let actual = codec.read(absolute)?;
    if !same_tag_set(&actual, tags) {
        return Err(Error::TagRoundTrip {
            path: relative.to_string(),
            expected: sorted_tags(tags),
            actual: sorted_tags(&actual),
        });
    }
    Ok(sorted_tags(tags))
}
