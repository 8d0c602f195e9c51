//! Filesystem primitives for tagsync
//!
//! Provides normalized collection paths, the default path-validity predicate,
//! atomic locked writes, SHA-256 digests and a format-agnostic config store.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use path::{NormalizedPath, STAGING_DIR, is_acceptable_path};
