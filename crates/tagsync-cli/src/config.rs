//! Configuration file discovery and resolution
//!
//! Settings come from a `tagsync.toml` file, looked up in this order:
//! the `--config` flag, `./tagsync.toml`, then `tagsync/config.toml` in the
//! user configuration directory. Command-line roots override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tagsync_fs::{ConfigStore, NormalizedPath};

use crate::error::{CliError, Result};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "tagsync.toml";

/// Default snapshot file name inside the snapshot root
pub const DEFAULT_SNAPSHOT_NAME: &str = "data.json";

/// Contents of a configuration file; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub music_root: Option<PathBuf>,
    pub snapshot_root: Option<PathBuf>,
    pub snapshot_name: Option<String>,
    pub extensions: Option<Vec<String>>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub music_root: PathBuf,
    pub snapshot_root: PathBuf,
    pub snapshot_name: String,
    pub extensions: Vec<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides<'a> {
    pub config: Option<&'a Path>,
    pub music_root: Option<&'a Path>,
    pub snapshot_root: Option<&'a Path>,
}

/// Find the configuration file to use, if any.
///
/// An explicit path is returned even if it does not exist, so that a typo
/// surfaces as an error instead of silently falling back.
pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(cwd.join(path));
    }

    let local = cwd.join(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("tagsync").join("config.toml");
    user.is_file().then_some(user)
}

/// Resolve settings from the configuration file and command-line overrides.
///
/// Relative paths in a file are taken relative to that file's directory;
/// relative paths on the command line are taken relative to `cwd`.
pub fn resolve(cwd: &Path, overrides: Overrides<'_>) -> Result<Settings> {
    let (file, base) = match locate(overrides.config, cwd) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            let file: ConfigFile = ConfigStore::new().load(&NormalizedPath::new(&path))?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
            (file, base)
        }
        None => (ConfigFile::default(), cwd.to_path_buf()),
    };

    let music_root = overrides
        .music_root
        .map(|p| cwd.join(p))
        .or_else(|| file.music_root.as_ref().map(|p| base.join(p)))
        .ok_or_else(|| {
            CliError::user("No music root configured. Set music_root in tagsync.toml or pass --music-root.")
        })?;
    let snapshot_root = overrides
        .snapshot_root
        .map(|p| cwd.join(p))
        .or_else(|| file.snapshot_root.as_ref().map(|p| base.join(p)))
        .ok_or_else(|| {
            CliError::user(
                "No snapshot root configured. Set snapshot_root in tagsync.toml or pass --snapshot-root.",
            )
        })?;

    let snapshot_name = file
        .snapshot_name
        .unwrap_or_else(|| DEFAULT_SNAPSHOT_NAME.to_string());
    if !snapshot_name.to_ascii_lowercase().ends_with(".json") || snapshot_name.contains('/') {
        return Err(CliError::user(format!(
            "snapshot_name must be a plain .json file name, got '{snapshot_name}'"
        )));
    }

    let extensions = file.extensions.unwrap_or_else(|| vec!["mp3".to_string()]);
    if extensions.is_empty() {
        return Err(CliError::user("extensions must list at least one file type"));
    }

    Ok(Settings {
        music_root,
        snapshot_root,
        snapshot_name,
        extensions,
    })
}
