//! Core synchronization layer for tagsync
//!
//! This crate keeps a media collection on disk in step with an editable
//! snapshot of it, implementing:
//!
//! - **Snapshots**: per-file records of path, content identity and tags,
//!   persisted as a pretty-printed JSON array
//! - **Frames**: parsing and rendering of metadata frame snapshot strings
//! - **Blob store**: content-addressed storage for embedded artwork
//! - **Collection**: scanning, tag rewrites and synchronization towards a
//!   desired state
//! - **Rename engine**: cycle-safe reorganization through a staging directory
//! - **Recovery**: resolution of files stranded by an interrupted run
//!
//! # Architecture
//!
//! ```text
//!               tagsync (CLI)
//!                    |
//!              tagsync-core
//!                    |
//!               tagsync-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tagsync_core::{Collection, CollectionOptions, SnapshotStore, SyncOptions};
//!
//! let store = SnapshotStore::open("/data/snapshots".into())?;
//! let mut collection = Collection::open("/music".into(), &store, CollectionOptions::default())?;
//! collection.scan()?;
//! store.save("data.json", &collection.state())?;
//!
//! // ... edit data.json ...
//!
//! let desired = store.load("data.json")?;
//! let report = collection.synchronize(&desired, SyncOptions::default())?;
//! ```

pub mod blob;
pub mod codec;
pub mod collection;
pub mod engine;
pub mod error;
pub mod frame;
pub mod identity;
pub mod recovery;
pub mod snapshot;

pub use blob::{BlobStore, extension_for_mime, mime_for_name, referenced_blobs};
pub use codec::{HEADER_MAGIC, HeaderCodec, TagCodec};
pub use collection::{Collection, CollectionOptions, PathPredicate, ScanReport};
pub use engine::{PlannedMove, SyncOptions, SyncReport};
pub use error::{Error, Result};
pub use frame::{Frame, FrameValue, PICTURE_FRAME, picture_refs, same_tag_set, sorted_tags};
pub use identity::{ContentIdentity, StrippedPayloadIdentity};
pub use recovery::{RecoveryReport, Restored, Unresolved};
pub use snapshot::{
    FileSnapshot, PICTURES_DIR, SnapshotCache, SnapshotStore, UNKNOWN_MODIFIED, canonical_order,
    modified_of,
};
pub use tagsync_fs::{NormalizedPath, STAGING_DIR};
