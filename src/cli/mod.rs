//! The Sketchy command-line interface.
//!
//! Parses arguments, sets up logging and dispatches to the [`project`] runs.
//!
//! [`project`]: crate::project

use std::process;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::args::{Mode, SketchyArgs};
use crate::cli::output::Printer;
use crate::config::ProjectConfig;
use crate::errors::Result;
use crate::project;

pub mod args;
pub mod output;

/// The main entry point for the CLI. Exits with status 1 on any failure.
pub fn run() {
    let args = SketchyArgs::parse();
    init_tracing(args.verbose);

    if let Err(err) = dispatch(&args) {
        eprintln!("{:?}", miette::Report::new(err));
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug output for this crate.
fn init_tracing(verbose: bool) {
    let default = if verbose { "sketchy=debug" } else { "sketchy=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn dispatch(args: &SketchyArgs) -> Result<()> {
    let config = ProjectConfig::from_env(&args.project_dir).with_verbose(args.verbose);
    let mut printer = Printer::new();

    match args.mode.mode() {
        Mode::Pre => handle_pre(&config, args.dry_run, &mut printer),
        Mode::Post => {
            printer.status("Restore originals");
            let report = project::post(&config)?;
            report_restore(&config, &report, &mut printer);
            Ok(())
        }
        Mode::Clean => {
            printer.status("Clean cache");
            let report = project::clean(&config)?;
            report_restore(&config, &report, &mut printer);
            Ok(())
        }
        Mode::ListMacros => {
            let table = project::load_macros(&config)?;
            printer.macros_json(&table)
        }
    }
}

fn handle_pre(config: &ProjectConfig, dry_run: bool, printer: &mut Printer) -> Result<()> {
    let report = project::pre(config, dry_run)?;
    printer.status(&format!("Loaded {} macros", report.macro_count));

    if dry_run {
        for preview in &report.previews {
            printer.diff(&preview.path, &preview.original, &preview.output);
        }
        printer.status(&format!(
            "Dry run complete. {} of {} files would change",
            report.previews.len(),
            report.processed
        ));
        return Ok(());
    }

    if config.verbose {
        for path in &report.modified {
            printer.detail(&relative(config, path));
        }
    }
    printer.status(&format!(
        "Pre complete. Modified {} files in {} ms",
        report.modified.len(),
        report.elapsed.as_millis()
    ));
    Ok(())
}

fn report_restore(config: &ProjectConfig, report: &project::RestoreReport, printer: &mut Printer) {
    if !config.verbose {
        return;
    }
    for path in &report.restored {
        printer.detail(&format!("restored {}", relative(config, path)));
    }
    for path in &report.archived {
        printer.detail(&format!("archived {}", path.display()));
    }
    for path in &report.removed {
        printer.detail(&format!("removed {}", relative(config, path)));
    }
}

fn relative(config: &ProjectConfig, path: &std::path::Path) -> String {
    path.strip_prefix(&config.root)
        .unwrap_or(path)
        .display()
        .to_string()
}
