//! Tag codec boundary
//!
//! The collection never interprets a media container itself. It reads and
//! writes frame snapshots through a [`TagCodec`], which must satisfy the
//! round-trip law: tags written by `write` read back as the same multiset.

use tagsync_fs::{NormalizedPath, io};

use crate::blob::BlobStore;
use crate::frame::{Frame, sorted_tags};
use crate::{Error, Result};

/// Reads and writes the metadata container of a media file.
pub trait TagCodec {
    /// Frame snapshots of the file, canonically sorted.
    fn read(&self, path: &NormalizedPath) -> Result<Vec<String>>;

    /// Replace the file's metadata with `tags`, keeping its payload.
    fn write(&self, path: &NormalizedPath, tags: &[String]) -> Result<()>;

    /// Remove the metadata container, leaving only the payload.
    fn strip(&self, path: &NormalizedPath) -> Result<()>;
}

/// Leading bytes of a file carrying a tagsync header
pub const HEADER_MAGIC: &[u8; 4] = b"TSYN";

const LEN_BYTES: usize = 4;

/// Codec for files with a leading metadata header.
///
/// Layout: `TSYN`, a big-endian `u32` byte length, a JSON array of frame
/// snapshot strings of that length, then the payload. A file without the
/// magic has no tags and is all payload. Picture frames must reference blobs
/// present in the configured [`BlobStore`].
#[derive(Debug, Clone)]
pub struct HeaderCodec {
    blobs: BlobStore,
}

impl HeaderCodec {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }

    fn codec_error(path: &NormalizedPath, message: impl Into<String>) -> Error {
        Error::Codec {
            path: path.to_native(),
            message: message.into(),
        }
    }

    /// Split raw file bytes into (tags, payload).
    fn split<'a>(path: &NormalizedPath, bytes: &'a [u8]) -> Result<(Vec<String>, &'a [u8])> {
        if !bytes.starts_with(HEADER_MAGIC) {
            return Ok((Vec::new(), bytes));
        }
        let body = &bytes[HEADER_MAGIC.len()..];
        if body.len() < LEN_BYTES {
            return Err(Self::codec_error(path, "truncated header length"));
        }
        let mut len_buf = [0u8; LEN_BYTES];
        len_buf.copy_from_slice(&body[..LEN_BYTES]);
        let len = u32::from_be_bytes(len_buf) as usize;
        let rest = &body[LEN_BYTES..];
        if rest.len() < len {
            return Err(Self::codec_error(path, "header longer than file"));
        }
        let tags: Vec<String> = serde_json::from_slice(&rest[..len])
            .map_err(|e| Self::codec_error(path, format!("bad header: {e}")))?;
        Ok((tags, &rest[len..]))
    }

    fn encode(path: &NormalizedPath, tags: &[String], payload: &[u8]) -> Result<Vec<u8>> {
        if tags.is_empty() {
            return Ok(payload.to_vec());
        }
        let header = serde_json::to_vec(tags)?;
        let len = u32::try_from(header.len())
            .map_err(|_| Self::codec_error(path, "header exceeds 4 GiB"))?;
        let mut out = Vec::with_capacity(HEADER_MAGIC.len() + LEN_BYTES + header.len() + payload.len());
        out.extend_from_slice(HEADER_MAGIC);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        Ok(out)
    }

    fn rewrite(&self, path: &NormalizedPath, tags: &[String]) -> Result<()> {
        let bytes = io::read_bytes(path)?;
        let (_, payload) = Self::split(path, &bytes)?;
        let encoded = Self::encode(path, tags, payload)?;
        io::write_atomic(path, &encoded)?;
        Ok(())
    }
}

impl TagCodec for HeaderCodec {
    fn read(&self, path: &NormalizedPath) -> Result<Vec<String>> {
        let bytes = io::read_bytes(path)?;
        let (tags, _) = Self::split(path, &bytes)?;
        for tag in &tags {
            Frame::parse(tag)?;
        }
        Ok(sorted_tags(&tags))
    }

    fn write(&self, path: &NormalizedPath, tags: &[String]) -> Result<()> {
        for tag in tags {
            let frame = Frame::parse(tag)?;
            if let Some(name) = frame.picture_ref() {
                if !self.blobs.contains(name) {
                    return Err(Error::BlobMissing {
                        name: name.to_string(),
                    });
                }
            }
        }
        self.rewrite(path, &sorted_tags(tags))
    }

    fn strip(&self, path: &NormalizedPath) -> Result<()> {
        self.rewrite(path, &[])
    }
}
