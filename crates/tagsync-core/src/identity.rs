//! Content identity of tracked files

use tagsync_fs::{NormalizedPath, checksum};

use crate::codec::TagCodec;
use crate::{Error, Result};

/// Computes a digest of a file's payload that does not change when only its
/// metadata changes.
pub trait ContentIdentity {
    fn identity(&self, path: &NormalizedPath) -> Result<String>;
}

/// Hashes a scratch copy of the file after stripping its metadata with a codec.
///
/// The original file is never modified.
#[derive(Debug, Clone)]
pub struct StrippedPayloadIdentity<C> {
    codec: C,
}

impl<C: TagCodec> StrippedPayloadIdentity<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }
}

impl<C: TagCodec> ContentIdentity for StrippedPayloadIdentity<C> {
    fn identity(&self, path: &NormalizedPath) -> Result<String> {
        let scratch_dir = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let file_name = path.file_name().unwrap_or("scratch");
        let scratch = NormalizedPath::new(scratch_dir.path().join(file_name));

        std::fs::copy(path.as_ref(), scratch.as_ref()).map_err(|e| Error::io(path.to_native(), e))?;
        self.codec.strip(&scratch)?;

        Ok(checksum::hash_file(scratch.as_ref())?)
    }
}
