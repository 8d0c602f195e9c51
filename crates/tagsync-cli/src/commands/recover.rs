//! Recover command implementation
//!
//! Restores files stranded in the staging directory by an interrupted
//! apply, matching them against the saved snapshot.

use colored::Colorize;

use tagsync_core::STAGING_DIR;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the recover command
///
/// Fails if any stranded file could not be placed, so scripts notice.
pub fn run_recover(ctx: &Context) -> Result<()> {
    println!(
        "{} Looking for stranded files in {}...",
        "=>".blue().bold(),
        ctx.settings.music_root.join(STAGING_DIR).display()
    );

    let desired = ctx.try_load_snapshot()?;
    if desired.is_none() {
        println!(
            "{} No snapshot saved; stranded files cannot be matched.",
            "NOTE".yellow().bold()
        );
    }
    let collection = ctx.collection()?;
    let report = collection.recover(desired.as_deref())?;

    if report.restored.is_empty() && report.unresolved.is_empty() {
        println!("{} Nothing to recover.", "OK".green().bold());
        return Ok(());
    }

    for restored in &report.restored {
        println!(
            "   {} {} -> {}",
            "+".green(),
            restored.staged.dimmed(),
            restored.path.cyan()
        );
    }
    for unresolved in &report.unresolved {
        println!(
            "   {} {} ({}): {}",
            "?".red(),
            unresolved.staged.cyan(),
            unresolved.content_hash.dimmed(),
            unresolved.reason
        );
    }

    if !report.is_clean() {
        return Err(CliError::user(format!(
            "{} stranded file(s) need manual resolution",
            report.unresolved.len()
        )));
    }
    println!(
        "{} Restored {} file(s). Run {} to refresh the snapshot.",
        "OK".green().bold(),
        report.restored.len(),
        "tagsync update".cyan()
    );
    Ok(())
}
