//! # Project Runs
//!
//! The IDE calls the tool before a build (`pre`) and after it (`post`), with
//! `clean` wiping every trace of a previous run.
//!
//! A pre-build run rewrites scripts in place. For `scripts/a.gml`:
//!
//! - `scripts/a.gml_mod` always receives the rewritten text, as a readable
//!   view of what was compiled;
//! - `scripts/a.gml_bak` receives the original, only when the rewrite changed
//!   something, and `scripts/a.gml` is then overwritten.
//!
//! A post-build run moves every `_bak` back over its script. When an archive
//! directory is configured each backup is first copied there, so earlier
//! versions of hand-written sources survive even a crashed build.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::discovery::{discover_sources, is_source_file, needs_rewrite, project_files};
use crate::errors::{Result, SketchyError};
use crate::macros::{build_table, MacroTable};
use crate::rewrite::Rewriter;

pub const BACKUP_SUFFIX: &str = "_bak";
pub const EXPANDED_SUFFIX: &str = "_mod";

/// Archived versions kept per file name.
pub const MAX_ARCHIVES: usize = 5;

// ============================================================================
// REPORTS
// ============================================================================

/// A file whose rewrite differs from its original, kept for dry-run output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub path: PathBuf,
    pub original: String,
    pub output: String,
}

#[derive(Debug, Clone, Default)]
pub struct PreReport {
    pub macro_count: usize,
    /// Files that passed the prefilter and were rewritten.
    pub processed: usize,
    /// Files overwritten with their rewrite (empty for dry runs).
    pub modified: Vec<PathBuf>,
    /// Changed files of a dry run.
    pub previews: Vec<Preview>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    pub archived: Vec<PathBuf>,
    /// `_mod` files deleted by a clean run.
    pub removed: Vec<PathBuf>,
}

// ============================================================================
// RUNS
// ============================================================================

/// Pre-build run. With `dry_run` nothing on disk changes and every changed
/// file is returned as a [`Preview`].
///
/// # Errors
/// The first definition, directive, expansion or I/O failure aborts the run;
/// the failing file is never written.
#[tracing::instrument(level = "debug", skip_all, fields(root = %config.root.display(), dry_run = dry_run))]
pub fn pre(config: &ProjectConfig, dry_run: bool) -> Result<PreReport> {
    let started = Instant::now();
    if !dry_run {
        let leftovers = restore_backups(config, None)?;
        if !leftovers.restored.is_empty() {
            warn!(count = leftovers.restored.len(), "restored backups left by an earlier run");
        }
    }

    let sources = read_sources(config)?;
    let table = build_table(sources.iter().map(|(path, text)| (path, text)))?;
    info!(macros = table.len(), files = sources.len(), "macro table built");

    let mut report = PreReport {
        macro_count: table.len(),
        ..PreReport::default()
    };
    let rewriter = Rewriter::new(&table);

    for (path, text) in &sources {
        if !needs_rewrite(text, &table) {
            continue;
        }
        let rewritten = rewriter.rewrite(path, text)?;
        report.processed += 1;

        if dry_run {
            if rewritten.changed {
                report.previews.push(Preview {
                    path: path.clone(),
                    original: text.clone(),
                    output: rewritten.output,
                });
            }
            continue;
        }

        write(&with_suffix(path, EXPANDED_SUFFIX), &rewritten.output)?;
        if rewritten.changed {
            copy(path, &with_suffix(path, BACKUP_SUFFIX))?;
            write(path, &rewritten.output)?;
            debug!(path = %path.display(), "rewritten");
            report.modified.push(path.clone());
        }
    }

    report.elapsed = started.elapsed();
    Ok(report)
}

/// Post-build run: restores originals, archiving backups when configured.
#[tracing::instrument(level = "debug", skip_all, fields(root = %config.root.display()))]
pub fn post(config: &ProjectConfig) -> Result<RestoreReport> {
    restore_backups(config, config.archive_dir.as_deref())
}

/// [`post`], then deletes every `_mod` file.
#[tracing::instrument(level = "debug", skip_all, fields(root = %config.root.display()))]
pub fn clean(config: &ProjectConfig) -> Result<RestoreReport> {
    let mut report = post(config)?;
    for path in suffixed_files(config, EXPANDED_SUFFIX)? {
        remove(&path)?;
        report.removed.push(path);
    }
    Ok(report)
}

/// Loads the macro table of the project without rewriting anything.
pub fn load_macros(config: &ProjectConfig) -> Result<MacroTable> {
    let sources = read_sources(config)?;
    build_table(sources.iter().map(|(path, text)| (path, text)))
}

fn read_sources(config: &ProjectConfig) -> Result<Vec<(PathBuf, String)>> {
    discover_sources(config)?
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).map_err(|err| SketchyError::io("read", &path, err))?;
            Ok((path, text))
        })
        .collect()
}

// ============================================================================
// BACKUPS
// ============================================================================

/// `a.gml` + `_bak` = `a.gml_bak`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn restore_backups(config: &ProjectConfig, archive_dir: Option<&Path>) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();
    for backup in suffixed_files(config, BACKUP_SUFFIX)? {
        let Some(original) = strip_suffix(&backup, BACKUP_SUFFIX) else {
            continue;
        };
        if let Some(dir) = archive_dir {
            if let Some(archived) = archive(dir, &backup, &original, unix_now())? {
                report.archived.push(archived);
            }
        }
        copy(&backup, &original)?;
        remove(&backup)?;
        debug!(path = %original.display(), "restored");
        report.restored.push(original);
    }
    Ok(report)
}

/// Files below the root named `<script>.gml<suffix>`, sorted.
fn suffixed_files(config: &ProjectConfig, suffix: &str) -> Result<Vec<PathBuf>> {
    project_files(config, |path| {
        strip_suffix(path, suffix).map_or(false, |original| is_source_file(&original))
    })
}

fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_suffix(suffix)?;
    Some(path.with_file_name(stripped))
}

// ============================================================================
// ARCHIVE
// ============================================================================

/// Copies `backup` to `<dir>/<file name of original>_<unix_secs>` unless the
/// newest archive of that name already holds the same content, then prunes
/// all but the [`MAX_ARCHIVES`] newest. Returns the new archive path, if any.
pub fn archive(dir: &Path, backup: &Path, original: &Path, unix_secs: u64) -> Result<Option<PathBuf>> {
    let Some(file_name) = original.file_name().and_then(|name| name.to_str()) else {
        return Ok(None);
    };
    fs::create_dir_all(dir).map_err(|err| SketchyError::io("create", dir, err))?;

    let content = fs::read(backup).map_err(|err| SketchyError::io("read", backup, err))?;
    let existing = archived_versions(dir, file_name)?;

    if let Some((_, newest)) = existing.last() {
        let previous = fs::read(newest).map_err(|err| SketchyError::io("read", newest, err))?;
        if content_hash(&previous) == content_hash(&content) {
            debug!(path = %newest.display(), "archive unchanged");
            return Ok(None);
        }
    }

    let target = dir.join(format!("{file_name}_{unix_secs}"));
    fs::write(&target, &content).map_err(|err| SketchyError::io("write", &target, err))?;

    let mut versions = archived_versions(dir, file_name)?;
    let excess = versions.len().saturating_sub(MAX_ARCHIVES);
    for (_, stale) in versions.drain(..excess) {
        remove(&stale)?;
    }
    Ok(Some(target))
}

/// Archives of `file_name` in `dir`, oldest first.
fn archived_versions(dir: &Path, file_name: &str) -> Result<Vec<(u64, PathBuf)>> {
    let prefix = format!("{file_name}_");
    let entries = fs::read_dir(dir).map_err(|err| SketchyError::io("list", dir, err))?;

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| SketchyError::io("list", dir, err))?;
        let name = entry.file_name();
        let stamp = name
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|stamp| stamp.parse::<u64>().ok());
        if let Some(stamp) = stamp {
            versions.push((stamp, entry.path()));
        }
    }
    versions.sort();
    Ok(versions)
}

/// Hex SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

// ============================================================================
// FILESYSTEM HELPERS
// ============================================================================

fn write(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|err| SketchyError::io("write", path, err))
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|err| SketchyError::io("copy", from, err))
}

fn remove(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|err| SketchyError::io("delete", path, err))
}
