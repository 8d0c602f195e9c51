//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// tagsync - Keep a music collection in step with its editable snapshot
#[derive(Parser, Debug)]
#[command(name = "tagsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./tagsync.toml, then the user config directory)
    #[arg(short, long, global = true, env = "TAGSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collection root, overriding the configuration file
    #[arg(long, global = true)]
    pub music_root: Option<PathBuf>,

    /// Snapshot root, overriding the configuration file
    #[arg(long, global = true)]
    pub snapshot_root: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Scan the collection and save its state as the snapshot
    ///
    /// Every tracked file is hashed and its tags are read. Blobs no longer
    /// referenced by any tag are removed afterwards.
    Scan,

    /// Rescan the collection, reusing the saved snapshot for unchanged files
    ///
    /// Files whose modification time matches the snapshot are not reread.
    Update,

    /// Reorganize the collection to match the saved snapshot
    ///
    /// Moves files to their snapshot paths and rewrites their tags. The
    /// snapshot must describe exactly the contents currently on disk.
    ///
    /// Examples:
    ///   tagsync apply             # Apply the snapshot
    ///   tagsync apply --dry-run   # Show the planned moves only
    Apply {
        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output the report as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show how the saved snapshot differs from the collection on disk
    Diff,

    /// Move files stranded by an interrupted apply back into the collection
    ///
    /// Each stranded file is matched by content against the saved snapshot
    /// and moved to the first vacant snapshot path with the same content.
    Recover,

    /// Generate shell completions
    ///
    /// Outputs completion script for your shell.
    ///
    /// Examples:
    ///   tagsync completions bash > ~/.local/share/bash-completion/completions/tagsync
    ///   tagsync completions zsh > ~/.zfunc/_tagsync
    ///   tagsync completions fish > ~/.config/fish/completions/tagsync.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
