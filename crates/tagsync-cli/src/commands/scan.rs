//! Scan and update command implementations
//!
//! Both rebuild the snapshot from the collection on disk. `update` reuses
//! the saved snapshot for files whose modification time is unchanged.

use colored::Colorize;

use tagsync_core::{FileSnapshot, ScanReport};

use crate::context::Context;
use crate::error::Result;

/// Run the scan command
pub fn run_scan(ctx: &Context) -> Result<()> {
    println!(
        "{} Scanning {}...",
        "=>".blue().bold(),
        ctx.settings.music_root.display()
    );
    scan_and_save(ctx, None)
}

/// Run the update command
pub fn run_update(ctx: &Context) -> Result<()> {
    println!(
        "{} Updating {}...",
        "=>".blue().bold(),
        ctx.settings.music_root.display()
    );
    let previous = ctx.try_load_snapshot()?;
    if previous.is_none() {
        println!(
            "{} No previous snapshot, every file will be read.",
            "NOTE".yellow().bold()
        );
    }
    scan_and_save(ctx, previous)
}

fn scan_and_save(ctx: &Context, previous: Option<Vec<FileSnapshot>>) -> Result<()> {
    let mut collection = ctx.collection()?;
    if let Some(previous) = previous {
        collection = collection.with_cache(previous);
    }

    let report = collection.scan()?;
    ctx.save_snapshot(&collection.state())?;
    let removed = collection.remove_unused_blobs()?;

    print_scan_report(&report);
    println!(
        "{} Saved {} file(s) to {} ({} cached)",
        "OK".green().bold(),
        report.scanned,
        ctx.snapshot_path().as_str().cyan(),
        report.cache_hits
    );
    for name in &removed {
        println!("   {} removed unused blob {}", "-".red(), name.dimmed());
    }
    Ok(())
}

pub(crate) fn print_scan_report(report: &ScanReport) {
    for path in &report.skipped {
        println!("   {} skipped {} (untracked type)", "!".yellow(), path);
    }
    if !report.stranded.is_empty() {
        println!(
            "{} Files left over from an interrupted apply:",
            "STRANDED".red().bold()
        );
        for path in &report.stranded {
            println!("   {} {}", "!".red(), path.cyan());
        }
        println!("Run {} to restore them.", "tagsync recover".cyan());
    }
}
