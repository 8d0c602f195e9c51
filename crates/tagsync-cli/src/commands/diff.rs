//! Diff command implementation
//!
//! Shows a unified diff from the collection on disk to the saved snapshot,
//! i.e. what `apply` would change.

use colored::Colorize;
use similar::TextDiff;

use tagsync_core::{FileSnapshot, canonical_order};

use crate::context::Context;
use crate::error::Result;

/// Run the diff command
pub fn run_diff(ctx: &Context) -> Result<()> {
    let saved = ctx.load_snapshot()?;
    let mut collection = ctx.collection()?;
    collection.scan()?;

    match render_diff(&collection.state(), &saved)? {
        None => println!(
            "{} No differences. The snapshot matches the collection.",
            "OK".green().bold()
        ),
        Some(diff) => {
            for line in diff.lines() {
                if line.starts_with("+++") || line.starts_with("---") {
                    println!("{}", line.bold());
                } else if line.starts_with("@@") {
                    println!("{}", line.cyan());
                } else if line.starts_with('+') {
                    println!("{}", line.green());
                } else if line.starts_with('-') {
                    println!("{}", line.red());
                } else {
                    println!("{line}");
                }
            }
        }
    }
    Ok(())
}

/// Unified diff of two states rendered as pretty JSON, or `None` if equal.
pub fn render_diff(on_disk: &[FileSnapshot], saved: &[FileSnapshot]) -> Result<Option<String>> {
    let old = serde_json::to_string_pretty(&canonical_order(on_disk.to_vec()))? + "\n";
    let new = serde_json::to_string_pretty(&canonical_order(saved.to_vec()))? + "\n";
    if old == new {
        return Ok(None);
    }

    let diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(3)
        .header("on-disk", "snapshot")
        .to_string();
    Ok(Some(diff))
}
