//! Invocation context shared by the commands
//!
//! Bundles the resolved settings with the snapshot store they point at.

use tagsync_core::{Collection, CollectionOptions, FileSnapshot, NormalizedPath, SnapshotStore};

use crate::config::Settings;
use crate::error::{CliError, Result};

pub struct Context {
    pub settings: Settings,
    pub store: SnapshotStore,
}

impl Context {
    /// Open the snapshot store named by `settings`, creating it if needed.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = SnapshotStore::open(NormalizedPath::new(&settings.snapshot_root))?;
        Ok(Self { settings, store })
    }

    /// Open the collection without scanning it.
    pub fn collection(&self) -> Result<Collection> {
        if !self.settings.music_root.is_dir() {
            return Err(CliError::user(format!(
                "Music root {} is not a directory",
                self.settings.music_root.display()
            )));
        }
        let options = CollectionOptions {
            extensions: self.settings.extensions.clone(),
        };
        Ok(Collection::open(
            NormalizedPath::new(&self.settings.music_root),
            &self.store,
            options,
        )?)
    }

    pub fn snapshot_path(&self) -> NormalizedPath {
        self.store.snapshot_path(&self.settings.snapshot_name)
    }

    /// The saved snapshot, or `None` if none was saved yet.
    pub fn try_load_snapshot(&self) -> Result<Option<Vec<FileSnapshot>>> {
        Ok(self.store.try_load(&self.settings.snapshot_name)?)
    }

    /// The saved snapshot; a missing snapshot is a user error.
    pub fn load_snapshot(&self) -> Result<Vec<FileSnapshot>> {
        self.try_load_snapshot()?.ok_or_else(|| {
            CliError::user(format!(
                "No snapshot at {}. Run 'tagsync scan' first.",
                self.snapshot_path()
            ))
        })
    }

    pub fn save_snapshot(&self, state: &[FileSnapshot]) -> Result<()> {
        self.store.save(&self.settings.snapshot_name, state)?;
        Ok(())
    }
}
