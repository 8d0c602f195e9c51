//! Rename engine: reorganizes a collection towards a desired state
//!
//! Synchronization runs in two phases.
//!
//! **Planning** never touches the disk. Desired paths must be distinct,
//! accepted by the collection's path predicate and must not overwrite files
//! the collection does not track. Entries identical in both states are set
//! aside. The remaining current and desired entries are sorted by content
//! hash (then path) and must carry exactly the same hash multiset; the i-th
//! current entry is paired with the i-th desired entry. Tags that will be
//! rewritten must parse and may only reference stored picture blobs.
//!
//! **Execution** walks the pairs depth-first with an explicit stack. Every
//! visited file is first moved to a unique name in the staging directory,
//! which vacates its path before anything depends on it. Before a file is
//! moved to its final path, whatever currently occupies that path (or one of
//! its parent directories) is staged first. Rename cycles therefore close on
//! an already vacated path, and each file is moved exactly twice. Tags are
//! rewritten after the final move and must read back as written.
//!
//! Afterwards, directories emptied by the moves are removed bottom-up.
//! There is no rollback: a failure mid-run can leave files in the staging
//! directory, which [`recovery`](crate::recovery) can resolve.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;

use serde::Serialize;
use tagsync_fs::{STAGING_DIR, checksum};
use tracing::{debug, info};
use uuid::Uuid;

use crate::collection::{Collection, write_verified};
use crate::frame::{Frame, same_tag_set, sorted_tags};
use crate::snapshot::{FileSnapshot, modified_of};
use crate::{Error, Result};

/// Options for a synchronization run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// If true, run every check and report the plan without modifying the
    /// filesystem. Actions are prefixed with "[dry-run] Would ..."
    pub dry_run: bool,
}

/// One file's relocation and relabeling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub from: String,
    pub to: String,
    pub content_hash: String,
    pub tags: Vec<String>,
    /// Whether the tags differ from the current ones
    pub rewrite: bool,
}

/// Report from a synchronization run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Entries identical in both states
    pub untouched: usize,
    /// Moves into the staging directory
    pub staged: usize,
    /// Moves from the staging directory to a final path
    pub placed: usize,
    /// Tag rewrites
    pub rewritten: usize,
    /// Directories removed because the run left them empty
    pub removed_dirs: Vec<String>,
    /// Blobs no longer referenced by any tag
    pub removed_blobs: Vec<String>,
    /// The pairing computed during planning
    pub planned: Vec<PlannedMove>,
    /// Human-readable log of what was (or would be) done
    pub actions: Vec<String>,
}

impl SyncReport {
    fn with_action(&mut self, action: String) {
        self.actions.push(action);
    }

    /// Whether the run changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.staged == 0 && self.placed == 0 && self.rewritten == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Visit {
    Pending,
    Staged { temp: String },
    Placed,
}

pub(crate) fn synchronize(
    collection: &mut Collection,
    desired: &[FileSnapshot],
    options: &SyncOptions,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let plan = plan(collection, desired, &mut report)?;

    if options.dry_run {
        for planned in &plan {
            if planned.from != planned.to {
                report.with_action(format!(
                    "[dry-run] Would move {} -> {}",
                    planned.from, planned.to
                ));
            }
            if planned.rewrite {
                report.with_action(format!("[dry-run] Would rewrite tags of {}", planned.to));
            }
        }
        report.planned = plan;
        return Ok(report);
    }

    let mut run = Run::new(collection, &plan);
    run.execute(&mut report)?;
    let vacated: Vec<String> = plan.iter().map(|m| m.from.clone()).collect();
    report.removed_dirs = remove_empty_dirs(collection, &vacated)?;
    report.planned = plan;

    info!(
        untouched = report.untouched,
        staged = report.staged,
        placed = report.placed,
        rewritten = report.rewritten,
        "synchronized collection"
    );
    Ok(report)
}

/// Validate `desired` against the collection and pair the entries that change.
fn plan(
    collection: &Collection,
    desired: &[FileSnapshot],
    report: &mut SyncReport,
) -> Result<Vec<PlannedMove>> {
    let mut desired_paths = HashSet::new();
    for entry in desired {
        if !desired_paths.insert(entry.path.as_str()) {
            return Err(Error::collision(&entry.path, "duplicate path in desired state"));
        }
        if entry.path.split('/').next() == Some(STAGING_DIR) {
            return Err(Error::collision(&entry.path, "inside the staging directory"));
        }
        if !(collection.accepts)(&entry.path) {
            return Err(Error::collision(&entry.path, "rejected by path validity predicate"));
        }
        if !checksum::is_digest(&entry.content_hash) {
            return Err(Error::invalid_entry(
                &entry.path,
                format!("content hash {:?} is not a SHA-256 hex digest", entry.content_hash),
            ));
        }
    }

    let mut untouched = HashSet::new();
    for entry in desired {
        if let Some(current) = collection.entries.get(&entry.path) {
            if current.same_content_and_labels(entry) {
                untouched.insert(entry.path.as_str());
            }
        }
    }
    report.untouched = untouched.len();

    let mut from: Vec<&FileSnapshot> = collection
        .entries
        .values()
        .filter(|s| !untouched.contains(s.path.as_str()))
        .collect();
    let mut to: Vec<&FileSnapshot> = desired
        .iter()
        .filter(|s| !untouched.contains(s.path.as_str()))
        .collect();
    from.sort_by(|a, b| (&a.content_hash, &a.path).cmp(&(&b.content_hash, &b.path)));
    to.sort_by(|a, b| (&a.content_hash, &a.path).cmp(&(&b.content_hash, &b.path)));

    check_content_sets(&from, &to)?;

    let remaining: HashSet<&str> = from.iter().map(|s| s.path.as_str()).collect();
    for target in &to {
        check_target(collection, &target.path, &desired_paths, &remaining)?;
    }

    let mut planned: Vec<PlannedMove> = from
        .iter()
        .zip(&to)
        .map(|(current, target)| PlannedMove {
            from: current.path.clone(),
            to: target.path.clone(),
            content_hash: target.content_hash.clone(),
            tags: sorted_tags(&target.tags),
            rewrite: !same_tag_set(&current.tags, &target.tags),
        })
        .collect();
    planned.sort_by(|a, b| a.from.cmp(&b.from));

    for planned in planned.iter().filter(|m| m.rewrite) {
        check_tags(collection, &planned.to, &planned.tags)?;
    }
    Ok(planned)
}

/// Tags about to be written must parse and their pictures must be stored.
fn check_tags(collection: &Collection, path: &str, tags: &[String]) -> Result<()> {
    for tag in tags {
        let frame = Frame::parse(tag).map_err(|e| Error::invalid_entry(path, e.to_string()))?;
        if let Some(name) = frame.picture_ref() {
            if !collection.blobs().contains(name) {
                return Err(Error::invalid_entry(
                    path,
                    format!("picture blob {name} is not in the store"),
                ));
            }
        }
    }
    Ok(())
}

/// Both sides are sorted by hash; walk them together and collect differences.
fn check_content_sets(from: &[&FileSnapshot], to: &[&FileSnapshot]) -> Result<()> {
    let mut missing = Vec::new();
    let mut unexpected = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < from.len() || j < to.len() {
        match (from.get(i), to.get(j)) {
            (Some(a), Some(b)) if a.content_hash == b.content_hash => {
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) if a.content_hash < b.content_hash => {
                missing.push(a.content_hash.clone());
                i += 1;
            }
            (Some(_), Some(b)) => {
                unexpected.push(b.content_hash.clone());
                j += 1;
            }
            (Some(a), None) => {
                missing.push(a.content_hash.clone());
                i += 1;
            }
            (None, Some(b)) => {
                unexpected.push(b.content_hash.clone());
                j += 1;
            }
            (None, None) => break,
        }
    }

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(Error::ContentSetMismatch {
            missing,
            unexpected,
        })
    }
}

/// A final path must not clobber anything the run does not itself vacate.
fn check_target(
    collection: &Collection,
    target: &str,
    desired_paths: &HashSet<&str>,
    remaining: &HashSet<&str>,
) -> Result<()> {
    let absolute = collection.absolute(target);
    if absolute.is_dir() {
        return Err(Error::collision(target, "a directory exists at this path"));
    }
    if absolute.exists() && !collection.entries.contains_key(target) {
        return Err(Error::collision(target, "would overwrite an untracked file"));
    }

    for ancestor in ancestors(target) {
        if desired_paths.contains(ancestor) {
            return Err(Error::collision(
                target,
                format!("parent {ancestor} is also a desired file"),
            ));
        }
        let absolute = collection.absolute(ancestor);
        if absolute.exists() && !absolute.is_dir() && !remaining.contains(ancestor) {
            let reason = if collection.entries.contains_key(ancestor) {
                format!("parent {ancestor} is a file that stays in place")
            } else {
                format!("parent {ancestor} is an untracked file")
            };
            return Err(Error::collision(target, reason));
        }
    }
    Ok(())
}

/// Proper ancestors of a relative path, nearest first.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .filter(|(_, c)| *c == '/')
        .map(|(i, _)| &path[..i])
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

/// Execution state of one synchronization.
struct Run<'a> {
    collection: &'a mut Collection,
    moves: BTreeMap<&'a str, &'a PlannedMove>,
    visits: HashMap<&'a str, Visit>,
}

impl<'a> Run<'a> {
    fn new(collection: &'a mut Collection, plan: &'a [PlannedMove]) -> Self {
        let moves: BTreeMap<&str, &PlannedMove> =
            plan.iter().map(|m| (m.from.as_str(), m)).collect();
        let visits = moves.keys().map(|from| (*from, Visit::Pending)).collect();
        Self {
            collection,
            moves,
            visits,
        }
    }

    fn is_pending(&self, path: &str) -> bool {
        matches!(self.visits.get(path), Some(Visit::Pending))
    }

    fn execute(&mut self, report: &mut SyncReport) -> Result<()> {
        let roots: Vec<&'a str> = self.moves.keys().copied().collect();
        let mut stack: Vec<&'a str> = Vec::new();

        for root in roots {
            if !self.is_pending(root) {
                continue;
            }
            self.stage(root, report)?;
            stack.push(root);

            while let Some(&top) = stack.last() {
                match self.pending_dependency(top) {
                    Some(next) => {
                        self.stage(next, report)?;
                        stack.push(next);
                    }
                    None => {
                        self.place(top, report)?;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    /// A not yet staged file sitting on `from`'s target path or on one of
    /// the target's parent directories.
    fn pending_dependency(&self, from: &str) -> Option<&'a str> {
        let planned: &'a PlannedMove = self.moves.get(from).copied()?;
        let target = planned.to.as_str();
        std::iter::once(target)
            .chain(ancestors(target))
            .find_map(|candidate| {
                self.moves
                    .get_key_value(candidate)
                    .map(|(key, _)| *key)
                    .filter(|key| self.is_pending(key))
            })
    }

    /// Move `from` to a fresh name in the staging directory.
    fn stage(&mut self, from: &'a str, report: &mut SyncReport) -> Result<()> {
        let extension = from.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("tmp");
        let temp = format!("{STAGING_DIR}/{}.{extension}", Uuid::new_v4().simple());

        let staging = self.collection.absolute(STAGING_DIR);
        fs::create_dir_all(staging.as_ref()).map_err(|e| Error::io(staging.to_native(), e))?;
        self.relocate(from, &temp)?;

        debug!(from, temp = %temp, "staged");
        report.staged += 1;
        report.with_action(format!("Staged {from} as {temp}"));
        self.visits.insert(from, Visit::Staged { temp });
        Ok(())
    }

    /// Move a staged file to its target and apply its tags.
    fn place(&mut self, from: &'a str, report: &mut SyncReport) -> Result<()> {
        let Some(Visit::Staged { temp }) = self.visits.get(from).cloned() else {
            return Err(Error::NotTracked {
                path: from.to_string(),
            });
        };
        let planned = self.moves[from];
        let target = planned.to.as_str();

        let absolute = self.collection.absolute(target);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent.as_ref()).map_err(|e| Error::io(parent.to_native(), e))?;
        }
        self.relocate(&temp, target)?;
        report.placed += 1;
        report.with_action(format!("Moved {from} -> {target}"));

        let tags = if planned.rewrite {
            let written = write_verified(&*self.collection.codec, &absolute, target, &planned.tags)?;
            report.rewritten += 1;
            report.with_action(format!("Rewrote tags of {target}"));
            written
        } else {
            planned.tags.clone()
        };
        let modified = modified_of(absolute.as_ref())?;

        if let Some(entry) = self.collection.entries.get_mut(target) {
            entry.content_hash = planned.content_hash.clone();
            entry.tags = tags;
            entry.modified = modified;
        }

        debug!(from, to = target, rewrite = planned.rewrite, "placed");
        self.visits.insert(from, Visit::Placed);
        Ok(())
    }

    /// Rename on disk and re-key the index entry in the same step.
    fn relocate(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self.collection.absolute(from);
        let destination = self.collection.absolute(to);
        fs::rename(source.as_ref(), destination.as_ref())
            .map_err(|e| Error::io(source.to_native(), e))?;

        let entries = &mut self.collection.entries;
        if let Some(mut entry) = entries.remove(from) {
            entry.path = to.to_string();
            entries.insert(to.to_string(), entry);
        }
        Ok(())
    }
}

/// Remove directories that the run left empty, deepest first.
///
/// Candidates are the staging directory and every parent directory of a
/// vacated path; directories that still hold anything are kept.
fn remove_empty_dirs(collection: &Collection, vacated: &[String]) -> Result<Vec<String>> {
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    candidates.insert(STAGING_DIR.to_string());
    for path in vacated {
        candidates.extend(ancestors(path).map(str::to_string));
    }

    let mut ordered: Vec<String> = candidates.into_iter().collect();
    ordered.sort_by(|a, b| {
        let depth = |p: &str| p.matches('/').count();
        depth(b.as_str()).cmp(&depth(a.as_str())).then_with(|| a.cmp(b))
    });

    let mut removed = Vec::new();
    for dir in ordered {
        let absolute = collection.absolute(&dir);
        if !absolute.is_dir() {
            continue;
        }
        let mut listing =
            fs::read_dir(absolute.as_ref()).map_err(|e| Error::io(absolute.to_native(), e))?;
        if listing.next().is_some() {
            continue;
        }
        fs::remove_dir(absolute.as_ref()).map_err(|e| Error::io(absolute.to_native(), e))?;
        debug!(dir = %dir, "removed empty directory");
        removed.push(dir);
    }
    Ok(removed)
}
