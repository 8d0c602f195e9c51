//! Apply command implementation
//!
//! Loads the saved snapshot as the desired state and reorganizes the
//! collection towards it.

use colored::Colorize;

use tagsync_core::{SyncOptions, SyncReport};

use super::scan::print_scan_report;
use crate::context::Context;
use crate::error::Result;

/// Run the apply command
///
/// The collection is scanned without the snapshot as cache: the snapshot
/// holds the desired tags, not the ones on disk.
pub fn run_apply(ctx: &Context, dry_run: bool, json: bool) -> Result<()> {
    let desired = ctx.load_snapshot()?;
    let mut collection = ctx.collection()?;

    if !json {
        println!(
            "{} Applying {} to {}...",
            "=>".blue().bold(),
            ctx.snapshot_path().as_str().cyan(),
            ctx.settings.music_root.display()
        );
    }
    let scan = collection.scan()?;
    if !json {
        print_scan_report(&scan);
    }

    let report = collection.synchronize(&desired, SyncOptions { dry_run })?;
    if !dry_run {
        ctx.save_snapshot(&collection.state())?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_sync_report(&report, dry_run);
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport, dry_run: bool) {
    if report.actions.is_empty() {
        println!(
            "{} Already synchronized. No changes needed.",
            "OK".green().bold()
        );
        return;
    }

    if dry_run {
        println!("{}", "Changes that would be made:".bold());
        for action in &report.actions {
            let clean = action.strip_prefix("[dry-run] ").unwrap_or(action);
            println!("   {} {}", "~".yellow(), clean);
        }
        println!();
        println!("Run {} to apply.", "tagsync apply".cyan());
        return;
    }

    println!("{} Synchronization complete:", "OK".green().bold());
    for action in &report.actions {
        println!("   {} {}", "+".green(), action);
    }
    for dir in &report.removed_dirs {
        println!("   {} removed empty directory {}", "-".red(), dir);
    }
    for name in &report.removed_blobs {
        println!("   {} removed unused blob {}", "-".red(), name.dimmed());
    }
    println!(
        "   {} moved, {} retagged, {} untouched",
        report.placed, report.rewritten, report.untouched
    );
}
