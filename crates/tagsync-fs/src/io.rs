//! Crash-safe file replacement
//!
//! Every file tagsync rewrites (snapshots, tag headers, blobs) goes through
//! [`write_atomic`]: a reader sees either the old bytes or the new ones,
//! never a prefix.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::Builder;

use crate::{Error, NormalizedPath, Result};

/// Replace `path` with `content`.
///
/// The bytes go to a locked sibling temp file that is flushed to disk and
/// renamed over the target, then the directory entry is flushed as well.
/// Missing parent directories are created. On failure the temp file is
/// removed and the target keeps its previous content.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let target = path.to_native();
    let parent = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut staged = Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(&parent)
        .map_err(|e| Error::io(&parent, e))?;

    let locked = || Error::LockFailed {
        path: target.clone(),
    };
    FileExt::lock_exclusive(staged.as_file()).map_err(|_| locked())?;
    staged
        .write_all(content)
        .map_err(|e| Error::io(staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::io(staged.path(), e))?;
    FileExt::unlock(staged.as_file()).map_err(|_| locked())?;

    // A failed persist hands the temp file back; dropping it deletes it
    staged
        .persist(&target)
        .map_err(|e| Error::io(&target, e.error))?;
    sync_dir(&parent)?;

    tracing::trace!(path = %path, bytes = content.len(), "atomic write");
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Read the full contents of a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}
