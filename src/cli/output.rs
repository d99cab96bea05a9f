//! User-facing output for the CLI.
//!
//! Status lines carry a coloured `[Sketchy]` prefix; colour is only used when
//! stdout is a terminal, so hook logs captured by the IDE stay plain.

use std::io::Write;
use std::path::Path;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::Result;
use crate::macros::MacroTable;

const PREFIX: &str = "[Sketchy]";

pub struct Printer {
    stdout: StandardStream,
}

impl Printer {
    pub fn new() -> Self {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    /// Prints `[Sketchy] <message>`.
    pub fn status(&mut self, message: &str) {
        let _ = self
            .stdout
            .set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = write!(self.stdout, "{PREFIX}");
        let _ = self.stdout.reset();
        let _ = writeln!(self.stdout, " {message}");
    }

    /// Prints an indented detail line, used in verbose mode.
    pub fn detail(&mut self, message: &str) {
        let _ = writeln!(self.stdout, "    {message}");
    }

    /// Prints a line diff between a file's original text and its rewrite.
    pub fn diff(&mut self, path: &Path, original: &str, output: &str) {
        let _ = self
            .stdout
            .set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(self.stdout, "--- {} ---", path.display());
        let _ = self.stdout.reset();

        let original = original.replace("\r\n", "\n");
        let changeset = Changeset::new(&original, output, "\n");
        for diff in &changeset.diffs {
            match diff {
                Difference::Same(text) => {
                    let _ = self.stdout.reset();
                    for line in text.split('\n') {
                        let _ = writeln!(self.stdout, " {line}");
                    }
                }
                Difference::Add(text) => {
                    let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                    for line in text.split('\n') {
                        let _ = writeln!(self.stdout, "+{line}");
                    }
                }
                Difference::Rem(text) => {
                    let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                    for line in text.split('\n') {
                        let _ = writeln!(self.stdout, "-{line}");
                    }
                }
            }
        }
        let _ = self.stdout.reset();
    }

    /// Prints the macro table, sorted by name, as pretty JSON.
    pub fn macros_json(&mut self, table: &MacroTable) -> Result<()> {
        let json = serde_json::to_string_pretty(&table.sorted())?;
        let _ = writeln!(self.stdout, "{json}");
        Ok(())
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}
