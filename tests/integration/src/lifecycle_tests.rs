//! End-to-end lifecycle tests
//!
//! These exercise the full round trip a user goes through: scan the
//! collection into a snapshot file, edit that file, apply it and refresh.

use pretty_assertions::assert_eq;
use tagsync_core::{
    Collection, CollectionOptions, FileSnapshot, NormalizedPath, STAGING_DIR, SnapshotStore,
    SyncOptions,
};
use tagsync_test_utils::TestCollection;

const SNAPSHOT: &str = "data.json";

fn store(fixture: &TestCollection) -> SnapshotStore {
    SnapshotStore::open(NormalizedPath::new(fixture.snapshot_root())).unwrap()
}

fn collection(fixture: &TestCollection, store: &SnapshotStore) -> Collection {
    Collection::open(
        NormalizedPath::new(fixture.music_root()),
        store,
        CollectionOptions::default(),
    )
    .unwrap()
}

/// Scan the collection and save the snapshot file.
fn scan_and_save(fixture: &TestCollection) -> Vec<FileSnapshot> {
    let store = store(fixture);
    let mut collection = collection(fixture, &store);
    collection.scan().unwrap();
    let state = collection.state();
    store.save(SNAPSHOT, &state).unwrap();
    state
}

/// Load the snapshot file, apply it and save the resulting state.
fn apply_saved(fixture: &TestCollection) -> tagsync_core::SyncReport {
    let store = store(fixture);
    let desired = store.load(SNAPSHOT).unwrap();
    let mut collection = collection(fixture, &store);
    collection.scan().unwrap();
    let report = collection
        .synchronize(&desired, SyncOptions::default())
        .unwrap();
    store.save(SNAPSHOT, &collection.state()).unwrap();
    report
}

fn edit_saved(fixture: &TestCollection, edit: impl FnOnce(&mut Vec<FileSnapshot>)) {
    let store = store(fixture);
    let mut state = store.load(SNAPSHOT).unwrap();
    edit(&mut state);
    store.save(SNAPSHOT, &state).unwrap();
}

#[test]
fn test_reorganize_album_through_snapshot_file() {
    let fixture = TestCollection::new();
    fixture.add_track("Unsorted/track01.mp3", b"first", &["TIT2(text=['Intro'])"]);
    fixture.add_track("Unsorted/track02.mp3", b"second", &["TIT2(text=['Outro'])"]);
    fixture.write_raw("Unsorted/notes.txt", b"keep me");
    scan_and_save(&fixture);

    edit_saved(&fixture, |state| {
        for entry in state.iter_mut() {
            let title = if entry.path.ends_with("01.mp3") { "Intro" } else { "Outro" };
            entry.path = format!("Artist/Album/{title}.mp3");
            entry.tags.push("TPE1(text=['Artist'])".to_string());
        }
    });
    let report = apply_saved(&fixture);

    assert_eq!(report.placed, 2);
    assert_eq!(report.rewritten, 2);
    fixture.assert_payload("Artist/Album/Intro.mp3", b"first");
    fixture.assert_payload("Artist/Album/Outro.mp3", b"second");
    assert_eq!(
        fixture.tags_of("Artist/Album/Intro.mp3"),
        vec!["TIT2(text=['Intro'])", "TPE1(text=['Artist'])"]
    );
    // The untracked file keeps its directory alive
    fixture.assert_file_exists("Unsorted/notes.txt");
    fixture.assert_file_not_exists(STAGING_DIR);

    // The saved state now describes the disk, so a fresh scan agrees
    let saved = store(&fixture).load(SNAPSHOT).unwrap();
    let rescanned = scan_and_save(&fixture);
    assert_eq!(rescanned, saved);

    let second = apply_saved(&fixture);
    assert!(second.is_noop());
    assert_eq!(second.untouched, 2);
}

#[test]
fn test_update_after_out_of_band_edit() {
    let fixture = TestCollection::new();
    fixture.add_track("1.mp3", b"one", &["TIT2(text=['One'])"]);
    fixture.add_track("2.mp3", b"two", &[]);
    let first = scan_and_save(&fixture);

    // Another tool replaces a file behind our back
    std::thread::sleep(std::time::Duration::from_millis(20));
    fixture.add_track("2.mp3", b"two", &["TIT2(text=['Two'])"]);

    let store = store(&fixture);
    let mut collection = collection(&fixture, &store).with_cache(first);
    let report = collection.scan().unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.cache_hits, 1);
    assert_eq!(collection.get("2.mp3").unwrap().tags, vec!["TIT2(text=['Two'])"]);
}

#[test]
fn test_adding_files_requires_rescan_before_apply() {
    let fixture = TestCollection::new();
    fixture.add_track("1.mp3", b"one", &[]);
    scan_and_save(&fixture);
    fixture.add_track("new.mp3", b"new", &[]);
    let before = fixture.files();

    let store = store(&fixture);
    let desired = store.load(SNAPSHOT).unwrap();
    let mut collection = collection(&fixture, &store);
    collection.scan().unwrap();
    let err = collection
        .synchronize(&desired, SyncOptions::default())
        .unwrap_err();

    assert!(err.is_pre_mutation(), "unexpected error: {err}");
    assert_eq!(fixture.files(), before);
}

mod artwork {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_cover_survives_until_last_reference_is_dropped() {
        let fixture = TestCollection::new();
        let store = store(&fixture);
        let cover = store.blobs().put(b"cover art", "image/jpeg").unwrap();
        let picture = format!("APIC(mime='image/jpeg', path='{cover}')");
        fixture.add_track("A/1.mp3", b"one", &[picture.as_str(), "TIT2(text=['One'])"]);
        fixture.add_track("A/2.mp3", b"two", &[picture.as_str()]);
        scan_and_save(&fixture);

        edit_saved(&fixture, |state| {
            state[0].tags.retain(|t| !t.starts_with("APIC"));
        });
        let report = apply_saved(&fixture);
        assert!(report.removed_blobs.is_empty());
        assert!(store.blobs().contains(&cover));
        assert_eq!(fixture.tags_of("A/1.mp3"), vec!["TIT2(text=['One'])"]);

        edit_saved(&fixture, |state| {
            state[1].tags.clear();
        });
        let report = apply_saved(&fixture);
        assert_eq!(report.removed_blobs, vec![cover.clone()]);
        assert!(!store.blobs().contains(&cover));
        assert_eq!(fixture.read_raw("A/2.mp3"), b"two".to_vec());
    }

    #[test]
    fn test_cover_added_through_blob_store() {
        let fixture = TestCollection::new();
        fixture.add_track("1.mp3", b"one", &[]);
        scan_and_save(&fixture);

        let store = store(&fixture);
        let cover = store.blobs().put(b"png art", "image/png").unwrap();
        assert!(cover.ends_with(".png"));
        let picture = format!("APIC(mime='image/png', path='{cover}')");
        edit_saved(&fixture, |state| state[0].tags.push(picture.clone()));

        let report = apply_saved(&fixture);

        assert_eq!(report.rewritten, 1);
        assert_eq!(fixture.tags_of("1.mp3"), vec![picture]);
        assert_eq!(store.blobs().get(&cover).unwrap(), b"png art".to_vec());
    }
}
