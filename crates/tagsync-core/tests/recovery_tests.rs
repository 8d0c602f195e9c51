//! Tests for resolving files stranded in the staging directory

use pretty_assertions::assert_eq;
use tagsync_core::{
    Collection, CollectionOptions, FileSnapshot, NormalizedPath, Restored, STAGING_DIR,
    SnapshotStore,
};
use tagsync_test_utils::TestCollection;

fn collection(fixture: &TestCollection) -> Collection {
    let store = SnapshotStore::open(NormalizedPath::new(fixture.snapshot_root())).unwrap();
    Collection::open(
        NormalizedPath::new(fixture.music_root()),
        &store,
        CollectionOptions::default(),
    )
    .unwrap()
}

fn strand(fixture: &TestCollection, name: &str, payload: &[u8]) -> String {
    fixture.add_track(&format!("{STAGING_DIR}/{name}"), payload, &[])
}

#[test]
fn test_restores_to_vacant_desired_path() {
    let fixture = TestCollection::new();
    let hash = strand(&fixture, "a1b2.mp3", b"one");
    let collection = collection(&fixture);
    let desired = vec![FileSnapshot::new("A/1.mp3", -1, hash, vec![])];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    assert_eq!(
        report.restored,
        vec![Restored {
            staged: format!("{STAGING_DIR}/a1b2.mp3"),
            path: "A/1.mp3".to_string(),
        }]
    );
    assert!(report.is_clean());
    fixture.assert_payload("A/1.mp3", b"one");
    fixture.assert_file_not_exists(STAGING_DIR);
}

#[test]
fn test_without_desired_state_everything_is_unresolved() {
    let fixture = TestCollection::new();
    let hash = strand(&fixture, "a1b2.mp3", b"one");
    let collection = collection(&fixture);

    let report = collection.recover(None).unwrap();

    assert!(report.restored.is_empty());
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].content_hash, hash);
    fixture.assert_file_exists(&format!("{STAGING_DIR}/a1b2.mp3"));
}

#[test]
fn test_occupied_path_is_unresolved() {
    let fixture = TestCollection::new();
    let hash = strand(&fixture, "a1b2.mp3", b"one");
    fixture.add_track("A/1.mp3", b"one", &[]);
    let collection = collection(&fixture);
    let desired = vec![FileSnapshot::new("A/1.mp3", -1, hash, vec![])];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.unresolved[0].staged, format!("{STAGING_DIR}/a1b2.mp3"));
    fixture.assert_file_exists(&format!("{STAGING_DIR}/a1b2.mp3"));
}

#[test]
fn test_unknown_content_is_unresolved() {
    let fixture = TestCollection::new();
    strand(&fixture, "a1b2.mp3", b"one");
    let collection = collection(&fixture);
    let desired = vec![FileSnapshot::new("A/1.mp3", -1, "0".repeat(64), vec![])];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    assert!(report.restored.is_empty());
    assert_eq!(report.unresolved.len(), 1);
    fixture.assert_file_not_exists("A/1.mp3");
}

#[test]
fn test_duplicate_content_fills_paths_in_order() {
    let fixture = TestCollection::new();
    let hash = strand(&fixture, "aaaa.mp3", b"same");
    strand(&fixture, "bbbb.mp3", b"same");
    let collection = collection(&fixture);
    let desired = vec![
        FileSnapshot::new("Z.mp3", -1, hash.clone(), vec![]),
        FileSnapshot::new("M.mp3", -1, hash, vec![]),
    ];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    let placed: Vec<(&str, &str)> = report
        .restored
        .iter()
        .map(|r| (r.staged.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        placed,
        vec![
            (".tagsync-staging/aaaa.mp3", "M.mp3"),
            (".tagsync-staging/bbbb.mp3", "Z.mp3"),
        ]
    );
}

#[test]
fn test_nothing_stranded_is_clean() {
    let fixture = TestCollection::new();
    fixture.add_track("1.mp3", b"one", &[]);
    let collection = collection(&fixture);

    let report = collection.recover(None).unwrap();

    assert!(report.is_clean());
    assert!(report.restored.is_empty());
}

#[test]
fn test_unplaceable_file_does_not_abort_recovery() {
    let fixture = TestCollection::new();
    let blocked = strand(&fixture, "0001.mp3", b"blocked");
    let free = strand(&fixture, "0002.mp3", b"free");
    fixture.write_raw("notes", b"a file where a directory is needed");
    let collection = collection(&fixture);
    let desired = vec![
        FileSnapshot::new("notes/1.mp3", -1, blocked.clone(), vec![]),
        FileSnapshot::new("2.mp3", -1, free, vec![]),
    ];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.restored[0].path, "2.mp3");
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].content_hash, blocked);
    assert!(report.unresolved[0].reason.contains("notes/1.mp3"));
    fixture.assert_file_exists(&format!("{STAGING_DIR}/0001.mp3"));
    fixture.assert_payload("2.mp3", b"free");
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_stranded_name_is_unresolved() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = TestCollection::new();
    let hash = strand(&fixture, "a1b2.mp3", b"one");
    let staging = fixture.music_root().join(STAGING_DIR);
    std::fs::write(staging.join(OsStr::from_bytes(b"\xfe.mp3")), b"odd").unwrap();
    let collection = collection(&fixture);
    let desired = vec![FileSnapshot::new("1.mp3", -1, hash, vec![])];

    let report = collection.recover(Some(desired.as_slice())).unwrap();

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.unresolved.len(), 1);
    assert!(report.unresolved[0].reason.contains("UTF-8"));
    assert!(staging.is_dir());
}
