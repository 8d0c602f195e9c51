//! Recovery of files stranded in the staging directory
//!
//! An interrupted synchronization can leave files under their temporary
//! names. Recovery matches each one by content identity against a desired
//! state and moves it to the first vacant desired path with the same hash.
//! Files that cannot be matched are reported, never guessed.

use std::collections::HashSet;
use std::fs;

use serde::Serialize;
use tagsync_fs::{NormalizedPath, STAGING_DIR};
use tracing::{info, warn};

use crate::collection::Collection;
use crate::snapshot::FileSnapshot;
use crate::{Error, Result};

/// A stranded file that was moved back into the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Restored {
    pub staged: String,
    pub path: String,
}

/// A stranded file that needs manual resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    pub staged: String,
    pub content_hash: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub restored: Vec<Restored>,
    pub unresolved: Vec<Unresolved>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl Collection {
    /// Resolve files left in the staging directory.
    ///
    /// Without a desired state every stranded file is reported as unresolved.
    /// Rescan the collection afterwards to pick up restored files.
    pub fn recover(&self, desired: Option<&[FileSnapshot]>) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let staging = self.absolute(STAGING_DIR);
        if !staging.is_dir() {
            return Ok(report);
        }

        let mut stranded = Vec::new();
        for entry in fs::read_dir(staging.as_ref()).map_err(|e| Error::io(staging.to_native(), e))? {
            let entry = entry.map_err(|e| Error::io(staging.to_native(), e))?;
            if !entry.path().is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => stranded.push(format!("{STAGING_DIR}/{name}")),
                Err(raw) => {
                    let staged = format!("{STAGING_DIR}/{}", raw.to_string_lossy());
                    warn!(staged = %staged, "stranded file has a non UTF-8 name");
                    report.unresolved.push(Unresolved {
                        staged,
                        content_hash: String::new(),
                        reason: "file name is not valid UTF-8".to_string(),
                    });
                }
            }
        }
        stranded.sort();

        let mut candidates: Vec<&FileSnapshot> = desired.unwrap_or_default().iter().collect();
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        let mut claimed: HashSet<&str> = HashSet::new();

        for staged in stranded {
            let absolute = self.absolute(&staged);
            let content_hash = self.identity.identity(&absolute)?;

            if desired.is_none() {
                report.unresolved.push(Unresolved {
                    staged,
                    content_hash,
                    reason: "no desired state to match against".to_string(),
                });
                continue;
            }

            let target = candidates.iter().find(|c| {
                c.content_hash == content_hash
                    && !claimed.contains(c.path.as_str())
                    && !self.absolute(&c.path).exists()
            });
            let Some(target) = target else {
                warn!(staged = %staged, "no vacant desired path for stranded file");
                report.unresolved.push(Unresolved {
                    staged,
                    content_hash,
                    reason: "no vacant desired path with this content".to_string(),
                });
                continue;
            };

            // A path that failed is not offered to later copies
            claimed.insert(target.path.as_str());
            match self.place_stranded(&absolute, &target.path) {
                Ok(()) => {
                    info!(staged = %staged, path = %target.path, "restored stranded file");
                    report.restored.push(Restored {
                        staged,
                        path: target.path.clone(),
                    });
                }
                Err(e) => {
                    warn!(staged = %staged, path = %target.path, error = %e, "could not restore stranded file");
                    report.unresolved.push(Unresolved {
                        staged,
                        content_hash,
                        reason: format!("cannot move to {}: {e}", target.path),
                    });
                }
            }
        }

        let empty = fs::read_dir(staging.as_ref())
            .map_err(|e| Error::io(staging.to_native(), e))?
            .next()
            .is_none();
        if empty {
            fs::remove_dir(staging.as_ref()).map_err(|e| Error::io(staging.to_native(), e))?;
        }
        Ok(report)
    }

    fn place_stranded(&self, staged: &NormalizedPath, relative: &str) -> Result<()> {
        let destination = self.absolute(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_ref()).map_err(|e| Error::io(parent.to_native(), e))?;
        }
        fs::rename(staged.as_ref(), destination.as_ref())
            .map_err(|e| Error::io(staged.to_native(), e))
    }
}
