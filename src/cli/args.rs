//! Command-line arguments.
//!
//! The layout matches the IDE build hooks, which invoke
//! `sketchy <PROJECT_DIR> --pre|--post|--clean [--verbose]`.

use clap::{Args, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sketchy",
    version,
    about = "Source-to-source preprocessor for GameMaker Language projects."
)]
pub struct SketchyArgs {
    /// Root of the GameMaker project.
    #[arg(value_name = "PROJECT_DIR")]
    pub project_dir: PathBuf,

    #[command(flatten)]
    pub mode: ModeFlags,

    /// Log each pass and list every modified file.
    #[arg(long, short)]
    pub verbose: bool,

    /// Rewrite in memory and print diffs instead of touching any file.
    #[arg(long, requires = "pre")]
    pub dry_run: bool,
}

/// Exactly one run mode must be given.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ModeFlags {
    /// Rewrite scripts before a build.
    #[arg(long)]
    pub pre: bool,
    /// Restore original scripts after a build.
    #[arg(long)]
    pub post: bool,
    /// Restore originals and delete cached rewrites.
    #[arg(long)]
    pub clean: bool,
    /// Print the project's macro table as JSON.
    #[arg(long)]
    pub list_macros: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Pre,
    Post,
    Clean,
    ListMacros,
}

impl ModeFlags {
    pub fn mode(&self) -> Mode {
        if self.pre {
            Mode::Pre
        } else if self.post {
            Mode::Post
        } else if self.clean {
            Mode::Clean
        } else {
            Mode::ListMacros
        }
    }
}
