//! Interrupted apply and recovery
//!
//! A run that fails after staging leaves files under the staging directory.
//! These tests drive a real failure through the engine, then restore the
//! collection from the saved snapshot and finish the job.

use pretty_assertions::assert_eq;
use tagsync_core::{
    Collection, CollectionOptions, Error, FileSnapshot, HeaderCodec, NormalizedPath, STAGING_DIR,
    SnapshotStore, StrippedPayloadIdentity, SyncOptions, TagCodec,
};
use tagsync_test_utils::TestCollection;

/// Codec whose writes always fail, as a full disk would.
struct FailingWrites(HeaderCodec);

impl TagCodec for FailingWrites {
    fn read(&self, path: &NormalizedPath) -> tagsync_core::Result<Vec<String>> {
        self.0.read(path)
    }

    fn write(&self, path: &NormalizedPath, _tags: &[String]) -> tagsync_core::Result<()> {
        Err(Error::Codec {
            path: path.to_native(),
            message: "no space left on device".to_string(),
        })
    }

    fn strip(&self, path: &NormalizedPath) -> tagsync_core::Result<()> {
        self.0.strip(path)
    }
}

fn store(fixture: &TestCollection) -> SnapshotStore {
    SnapshotStore::open(NormalizedPath::new(fixture.snapshot_root())).unwrap()
}

fn healthy(fixture: &TestCollection, store: &SnapshotStore) -> Collection {
    Collection::open(
        NormalizedPath::new(fixture.music_root()),
        store,
        CollectionOptions::default(),
    )
    .unwrap()
}

fn failing(fixture: &TestCollection, store: &SnapshotStore) -> Collection {
    let codec = HeaderCodec::new(store.blobs().clone());
    Collection::new(
        NormalizedPath::new(fixture.music_root()),
        Box::new(FailingWrites(codec.clone())),
        Box::new(StrippedPayloadIdentity::new(codec)),
        store.blobs().clone(),
        CollectionOptions::default(),
    )
    .unwrap()
}

/// Three files rotated A -> B -> C -> A, with new tags for the file landing on A.
fn rotation(fixture: &TestCollection) -> Vec<FileSnapshot> {
    fixture.add_track("A.mp3", b"alpha", &[]);
    fixture.add_track("B.mp3", b"beta", &[]);
    fixture.add_track("C.mp3", b"gamma", &[]);
    let store = store(fixture);
    let mut collection = healthy(fixture, &store);
    collection.scan().unwrap();

    collection
        .state()
        .into_iter()
        .map(|mut s| {
            s.path = match s.path.as_str() {
                "A.mp3" => "B.mp3".to_string(),
                "B.mp3" => "C.mp3".to_string(),
                _ => {
                    s.tags = vec!["TIT2(text=['Gamma'])".to_string()];
                    "A.mp3".to_string()
                }
            };
            s
        })
        .collect()
}

#[test]
fn test_failed_rewrite_strands_staged_files() {
    let fixture = TestCollection::new();
    let desired = rotation(&fixture);
    let store = store(&fixture);

    let mut collection = failing(&fixture, &store);
    collection.scan().unwrap();
    let err = collection
        .synchronize(&desired, SyncOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::Codec { .. }), "unexpected error: {err}");
    assert!(!err.is_pre_mutation());
    // C was placed on A before its rewrite failed; A and B are still staged
    fixture.assert_payload("A.mp3", b"gamma");
    fixture.assert_file_not_exists("B.mp3");
    fixture.assert_file_not_exists("C.mp3");

    let mut rescan = healthy(&fixture, &store);
    let report = rescan.scan().unwrap();
    assert_eq!(report.stranded.len(), 2);
    assert!(report.stranded.iter().all(|p| p.starts_with(STAGING_DIR)));
    assert_eq!(rescan.len(), 1);
}

#[test]
fn test_recover_then_apply_completes_interrupted_run() {
    let fixture = TestCollection::new();
    let desired = rotation(&fixture);
    let store = store(&fixture);
    store.save("data.json", &desired).unwrap();

    let mut collection = failing(&fixture, &store);
    collection.scan().unwrap();
    assert!(collection.synchronize(&desired, SyncOptions::default()).is_err());

    let saved = store.load("data.json").unwrap();
    let recovery = healthy(&fixture, &store).recover(Some(saved.as_slice())).unwrap();

    assert!(recovery.is_clean());
    let mut restored: Vec<&str> = recovery.restored.iter().map(|r| r.path.as_str()).collect();
    restored.sort();
    assert_eq!(restored, vec!["B.mp3", "C.mp3"]);
    fixture.assert_payload("B.mp3", b"alpha");
    fixture.assert_payload("C.mp3", b"beta");
    fixture.assert_file_not_exists(STAGING_DIR);

    // Only the failed rewrite remains
    let mut collection = healthy(&fixture, &store);
    collection.scan().unwrap();
    let report = collection
        .synchronize(&saved, SyncOptions::default())
        .unwrap();

    assert_eq!(report.rewritten, 1);
    assert_eq!(report.untouched, 2);
    assert_eq!(fixture.tags_of("A.mp3"), vec!["TIT2(text=['Gamma'])"]);
    fixture.assert_payload("A.mp3", b"gamma");
}

#[test]
fn test_recover_without_snapshot_leaves_files_staged() {
    let fixture = TestCollection::new();
    let desired = rotation(&fixture);
    let store = store(&fixture);

    let mut collection = failing(&fixture, &store);
    collection.scan().unwrap();
    assert!(collection.synchronize(&desired, SyncOptions::default()).is_err());
    let before = fixture.files();

    let recovery = healthy(&fixture, &store).recover(None).unwrap();

    assert!(!recovery.is_clean());
    assert_eq!(recovery.unresolved.len(), 2);
    assert_eq!(fixture.files(), before);
}
