//! Content-addressed store of auxiliary blobs (embedded artwork)
//!
//! Blobs are named `<sha256-hex>.<ext>`, with the extension derived from the
//! declared media type. Picture frames reference blobs by that name.

use std::collections::BTreeSet;
use std::fs;

use tagsync_fs::{NormalizedPath, checksum, io};
use tracing::{debug, info};

use crate::frame::picture_refs;
use crate::snapshot::FileSnapshot;
use crate::{Error, Result};

const MIME_TABLE: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
];

const FALLBACK_MIME: &str = "application/octet-stream";
const FALLBACK_EXTENSION: &str = "bin";

/// File extension for a media type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.trim().to_ascii_lowercase();
    let mime = if mime == "image/jpg" { "image/jpeg" } else { mime.as_str() };
    MIME_TABLE
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, ext)| *ext)
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Media type implied by a blob name's extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    let ext = ext.to_ascii_lowercase();
    let ext = if ext == "jpeg" { "jpg" } else { ext.as_str() };
    MIME_TABLE
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(m, _)| *m)
        .unwrap_or(FALLBACK_MIME)
}

/// Directory of content-addressed blobs.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: NormalizedPath,
}

impl BlobStore {
    /// Open the store, creating its directory if needed.
    pub fn open(dir: NormalizedPath) -> Result<Self> {
        fs::create_dir_all(dir.as_ref()).map_err(|e| Error::io(dir.to_native(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &NormalizedPath {
        &self.dir
    }

    fn path_of(&self, name: &str) -> NormalizedPath {
        self.dir.join(name)
    }

    /// Store `data` and return its name. Storing the same bytes twice is a no-op.
    pub fn put(&self, data: &[u8], mime: &str) -> Result<String> {
        let name = format!("{}.{}", checksum::hash_bytes(data), extension_for_mime(mime));
        let path = self.path_of(&name);
        if !path.exists() {
            io::write_atomic(&path, data)?;
            debug!(blob = %name, bytes = data.len(), "stored blob");
        }
        Ok(name)
    }

    /// Read a blob's bytes.
    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        if !self.contains(name) {
            return Err(Error::BlobMissing {
                name: name.to_string(),
            });
        }
        Ok(io::read_bytes(&self.path_of(name))?)
    }

    pub fn contains(&self, name: &str) -> bool {
        is_blob_name(name) && self.path_of(name).is_file()
    }

    /// Names of all stored blobs, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(self.dir.as_ref()).map_err(|e| Error::io(self.dir.to_native(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(self.dir.to_native(), e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| Error::io(entry.path(), e))?
                .is_file();
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every stored blob whose name is not in `referenced`.
    ///
    /// Returns the removed names.
    pub fn sweep(&self, referenced: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.list()? {
            if referenced.contains(&name) {
                continue;
            }
            let path = self.path_of(&name);
            fs::remove_file(path.as_ref()).map_err(|e| Error::io(path.to_native(), e))?;
            debug!(blob = %name, "removed unreferenced blob");
            removed.push(name);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "swept unreferenced blobs");
        }
        Ok(removed)
    }
}

/// Blob names referenced by the tags of every snapshot in `state`.
pub fn referenced_blobs<'a>(
    state: impl IntoIterator<Item = &'a FileSnapshot>,
) -> Result<BTreeSet<String>> {
    let mut referenced = BTreeSet::new();
    for snapshot in state {
        referenced.extend(picture_refs(&snapshot.tags)?);
    }
    Ok(referenced)
}

/// Blob names are a bare file name; anything with a separator is rejected so
/// a tag can never point outside the store.
fn is_blob_name(name: &str) -> bool {
    name.split_once('.').is_some_and(|(digest, ext)| {
        checksum::is_digest(digest)
            && !ext.is_empty()
            && ext.bytes().all(|b| b.is_ascii_alphanumeric())
    })
}
