//! Property tests for the rename engine

use proptest::prelude::*;
use tagsync_core::{
    Collection, CollectionOptions, FileSnapshot, NormalizedPath, STAGING_DIR, SnapshotStore,
    SyncOptions,
};
use tagsync_test_utils::TestCollection;

fn path_of(index: usize) -> String {
    format!("D{}/{}.mp3", index % 3, index)
}

fn permutation() -> impl Strategy<Value = Vec<usize>> {
    (1usize..7).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any permutation of paths is realized with two moves per relocated file.
    #[test]
    fn permutation_is_realized(perm in permutation()) {
        let fixture = TestCollection::new();
        for i in 0..perm.len() {
            fixture.add_track(&path_of(i), format!("payload {i}").as_bytes(), &[]);
        }
        let store = SnapshotStore::open(NormalizedPath::new(fixture.snapshot_root())).unwrap();
        let mut collection = Collection::open(
            NormalizedPath::new(fixture.music_root()),
            &store,
            CollectionOptions::default(),
        )
        .unwrap();
        collection.scan().unwrap();

        let desired: Vec<FileSnapshot> = collection
            .state()
            .into_iter()
            .map(|mut s| {
                let i = (0..perm.len()).find(|i| path_of(*i) == s.path).unwrap();
                s.path = path_of(perm[i]);
                s
            })
            .collect();
        let report = collection.synchronize(&desired, SyncOptions::default()).unwrap();

        let moved = perm.iter().enumerate().filter(|(i, p)| i != *p).count();
        prop_assert_eq!(report.staged, moved);
        prop_assert_eq!(report.placed, moved);
        prop_assert_eq!(report.untouched, perm.len() - moved);
        for (i, target) in perm.iter().enumerate() {
            let payload = fixture.payload_of(&path_of(*target));
            prop_assert_eq!(payload, format!("payload {i}").into_bytes());
        }
        prop_assert_eq!(fixture.files().len(), perm.len());
        prop_assert!(!fixture.music_root().join(STAGING_DIR).exists());

        let mut expected: Vec<FileSnapshot> = desired.clone();
        expected.sort_by(|a, b| a.path.cmp(&b.path));
        let state = collection.state();
        prop_assert_eq!(state.len(), expected.len());
        for (actual, wanted) in state.iter().zip(&expected) {
            prop_assert!(actual.same_content_and_labels(wanted));
        }
    }
}
