//! [`TestCollection`] builder for tagsync test scenarios.
//!
//! Track files are written in the header layout read by the bundled codec:
//! `TSYN`, a big-endian `u32` length, a JSON array of frame snapshots, then
//! the payload. The encoder here is independent of the production codec so
//! tests observe the on-disk format rather than trusting it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tagsync_fs::checksum;
use tempfile::TempDir;

const MAGIC: &[u8; 4] = b"TSYN";

/// Encode a track file with `tags` in front of `payload`.
///
/// No tags means the file is all payload.
pub fn encode_track(payload: &[u8], tags: &[&str]) -> Vec<u8> {
    if tags.is_empty() {
        return payload.to_vec();
    }
    let mut sorted: Vec<&str> = tags.to_vec();
    sorted.sort_unstable();
    let header = serde_json::to_vec(&sorted).unwrap();
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(header.len() as u32).to_be_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    out
}

/// Content identity of a track whose payload is `payload`.
pub fn payload_hash(payload: &[u8]) -> String {
    checksum::hash_bytes(payload)
}

fn split(bytes: &[u8]) -> (Vec<String>, Vec<u8>) {
    if !bytes.starts_with(MAGIC) {
        return (Vec::new(), bytes.to_vec());
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&bytes[4..8]);
    let len = u32::from_be_bytes(len) as usize;
    let tags: Vec<String> = serde_json::from_slice(&bytes[8..8 + len]).unwrap();
    (tags, bytes[8 + len..].to_vec())
}

/// A temporary directory holding a music root (`music/`) and a snapshot root
/// (`snapshots/`), with helpers for setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use tagsync_test_utils::TestCollection;
///
/// let fixture = TestCollection::new();
/// fixture.add_track("A/1.mp3", b"one", &["TIT2(text=['One'])"]);
/// fixture.assert_file_exists("A/1.mp3");
/// ```
pub struct TestCollection {
    temp_dir: TempDir,
}

impl Default for TestCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCollection {
    /// Create the temporary directory with empty music and snapshot roots.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("music")).unwrap();
        fs::create_dir_all(temp_dir.path().join("snapshots")).unwrap();
        Self { temp_dir }
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn music_root(&self) -> PathBuf {
        self.root().join("music")
    }

    pub fn snapshot_root(&self) -> PathBuf {
        self.root().join("snapshots")
    }

    /// Write a track at `path` (relative to the music root) and return its
    /// content hash.
    pub fn add_track(&self, path: &str, payload: &[u8], tags: &[&str]) -> String {
        self.write_raw(path, &encode_track(payload, tags));
        payload_hash(payload)
    }

    /// Write arbitrary bytes at `path` (relative to the music root).
    pub fn write_raw(&self, path: &str, bytes: &[u8]) {
        let full_path = self.music_root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, bytes).unwrap();
    }

    /// Payload of the track at `path`, without its header.
    pub fn payload_of(&self, path: &str) -> Vec<u8> {
        split(&self.read_raw(path)).1
    }

    /// Tags stored in the header of the track at `path`.
    pub fn tags_of(&self, path: &str) -> Vec<String> {
        split(&self.read_raw(path)).0
    }

    pub fn read_raw(&self, path: &str) -> Vec<u8> {
        let full_path = self.music_root().join(path);
        fs::read(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    /// Every file under the music root, keyed by `/`-separated relative path.
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        walk(&self.music_root(), "", &mut |relative, path| {
            if path.is_file() {
                files.insert(relative.to_string(), fs::read(path).unwrap());
            }
        });
        files
    }

    /// Every directory under the music root, as `/`-separated relative paths.
    pub fn dirs(&self) -> BTreeSet<String> {
        let mut dirs = BTreeSet::new();
        walk(&self.music_root(), "", &mut |relative, path| {
            if path.is_dir() {
                dirs.insert(relative.to_string());
            }
        });
        dirs
    }

    /// Assert that `path` (relative to the music root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.music_root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the music root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.music_root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the track at `path` carries `payload`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or its payload differs.
    pub fn assert_payload(&self, path: &str, payload: &[u8]) {
        let actual = self.payload_of(path);
        assert!(
            actual == payload,
            "Payload of {} differs.\nExpected: {:?}\nActual: {:?}",
            path,
            String::from_utf8_lossy(payload),
            String::from_utf8_lossy(&actual)
        );
    }
}

fn walk(dir: &Path, relative: &str, visit: &mut dyn FnMut(&str, &Path)) {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = if relative.is_empty() {
            name
        } else {
            format!("{relative}/{name}")
        };
        let path = entry.path();
        visit(&child, &path);
        if path.is_dir() {
            walk(&path, &child, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_track_splits_back() {
        let bytes = encode_track(b"data", &["TPE1(text=['b'])", "TALB(text=['a'])"]);
        let (tags, payload) = split(&bytes);
        assert_eq!(tags, vec!["TALB(text=['a'])", "TPE1(text=['b'])"]);
        assert_eq!(payload, b"data");
    }

    #[test]
    fn untagged_track_is_payload_only() {
        assert_eq!(encode_track(b"data", &[]), b"data");
    }

    #[test]
    fn files_and_dirs_are_listed_relative() {
        let fixture = TestCollection::new();
        fixture.add_track("A/B/1.mp3", b"one", &[]);

        assert_eq!(
            fixture.files().keys().cloned().collect::<Vec<_>>(),
            vec!["A/B/1.mp3"]
        );
        assert_eq!(
            fixture.dirs().into_iter().collect::<Vec<_>>(),
            vec!["A", "A/B"]
        );
    }
}
