//! Run configuration.
//!
//! The IDE launches the tool from build hooks and passes most of its context
//! through environment variables. [`ProjectConfig::from_lookup`] takes the
//! lookup as a closure so tests never touch the process environment.

use std::path::{Path, PathBuf};

/// Name of the tool's folder inside cache directories.
pub const TOOL_DIR_NAME: &str = "Sketchy";

/// Top-level project directories that never hold rewritable scripts.
pub const IGNORED_DIRS: [&str; 3] = ["extensions", "options", "datafiles"];

pub const ENV_PROJECT_CACHE_NAME: &str = "YYMACROS_project_cache_directory_name";
pub const ENV_IDE_CACHE_DIR: &str = "YYMACROS_ide_cache_directory";
pub const ENV_TEMP_FOLDER: &str = "YYtempFolder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub verbose: bool,
    /// Top-level directory names skipped during discovery, compared
    /// case-insensitively.
    pub ignored_dirs: Vec<String>,
    /// Where backups are archived on restore. `None` disables archiving.
    pub archive_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Configuration for `root` with no archive directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            verbose: false,
            ignored_dirs: IGNORED_DIRS.iter().map(|dir| dir.to_string()).collect(),
            archive_dir: None,
        }
    }

    /// Reads the archive location from the process environment.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Resolves the archive directory through `lookup`:
    /// `<ide cache>/<project cache name>/Sketchy` when both IDE variables are
    /// set, else `<temp folder>/Sketchy`, else none. Empty values count as unset.
    pub fn from_lookup<F>(root: impl Into<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let archive_dir = match (get(ENV_PROJECT_CACHE_NAME), get(ENV_IDE_CACHE_DIR)) {
            (Some(name), Some(ide_cache)) => {
                Some(PathBuf::from(ide_cache).join(name).join(TOOL_DIR_NAME))
            }
            _ => get(ENV_TEMP_FOLDER).map(|temp| PathBuf::from(temp).join(TOOL_DIR_NAME)),
        };

        Self {
            archive_dir,
            ..Self::new(root)
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_archive_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.archive_dir = dir;
        self
    }

    /// True when `relative` (a path below the root) starts in an ignored
    /// top-level directory.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let Some(first) = relative.components().next() else {
            return false;
        };
        let first = first.as_os_str().to_string_lossy();
        self.ignored_dirs
            .iter()
            .any(|dir| dir.eq_ignore_ascii_case(&first))
    }
}
