// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-oriented output for the `list` and `run` commands.

use clap::ValueEnum;
use gotree_runner::{
    catalog::{Catalog, FailureReason, IncompleteReason, PassKind, RunState, TestEntry},
    runner::BatchSummary,
};
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};

/// Output formats for `gotree list`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum MessageFormat {
    /// Packages followed by their tests, indented.
    #[default]
    Human,
    /// A single JSON object.
    Json,
    /// A single pretty-printed JSON object.
    JsonPretty,
}

/// Writes the catalog in the given format.
pub(crate) fn write_list(
    catalog: &Catalog,
    format: MessageFormat,
    styles: &Styles,
    mut writer: impl Write,
) -> io::Result<()> {
    match format {
        MessageFormat::Human => {
            if catalog.is_empty() {
                writeln!(writer, "(no tests found)")?;
            }
            for package in catalog.packages() {
                writeln!(writer, "{}:", package.name().style(styles.package))?;
                for entry in package.entries() {
                    writeln!(writer, "    {}", entry.name().style(styles.test_name))?;
                }
            }
        }
        MessageFormat::Json => {
            serde_json::to_writer(&mut writer, &catalog.summary())?;
            writeln!(writer)?;
        }
        MessageFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut writer, &catalog.summary())?;
            writeln!(writer)?;
        }
    }
    writer.flush()
}

/// Reports test runs as they finish.
#[derive(Debug, Default)]
pub(crate) struct RunReporter {
    styles: Styles,
}

impl RunReporter {
    pub(crate) fn new(styles: Styles) -> Self {
        Self { styles }
    }

    pub(crate) fn write_started(&self, count: usize, mut writer: impl Write) -> io::Result<()> {
        writeln!(
            writer,
            "{:>12} {} {}",
            "Starting".style(self.styles.pass),
            count.style(self.styles.count),
            if count == 1 { "test" } else { "tests" },
        )
    }

    /// Writes the status line for an entry that reached a terminal state, followed by its
    /// captured output if it failed.
    pub(crate) fn write_finished(
        &self,
        entry: &TestEntry,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let (status, style) = self.status(entry.run_state());
        writeln!(
            writer,
            "{:>12} {} {}",
            status.style(style),
            entry.package_name().style(self.styles.package),
            entry.name().style(self.styles.test_name),
        )?;

        let RunState::Failed(reason) = entry.run_state() else {
            return Ok(());
        };

        if !matches!(reason, FailureReason::Assertion) {
            writeln!(writer, "{:>12} {reason}", "")?;
        }
        if !entry.captured_output().is_empty() {
            writeln!(
                writer,
                "\n{} {} {} {}",
                "--- OUTPUT:".style(self.styles.fail),
                entry.package_name().style(self.styles.package),
                entry.name().style(self.styles.test_name),
                "---".style(self.styles.fail),
            )?;
            writer.write_all(entry.captured_output().as_bytes())?;
            if !entry.captured_output().ends_with('\n') {
                writeln!(writer)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub(crate) fn write_summary(
        &self,
        summary: &BatchSummary,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let summary_style = if summary.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        writeln!(
            writer,
            "{:>12} {} tests run: {} {}, {} {}, {} {}",
            "Summary".style(summary_style),
            summary.total().style(self.styles.count),
            summary.passed.style(self.styles.count),
            "passed".style(self.styles.pass),
            summary.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip),
            summary.failed.style(self.styles.count),
            "failed".style(self.styles.fail),
        )?;
        writer.flush()
    }

    fn status(&self, state: &RunState) -> (&'static str, Style) {
        match state {
            RunState::Passed(PassKind::Ok) => ("PASS", self.styles.pass),
            RunState::Passed(PassKind::Skipped) => ("SKIP", self.styles.skip),
            RunState::Failed(FailureReason::Assertion) => ("FAIL", self.styles.fail),
            RunState::Failed(FailureReason::Incomplete(IncompleteReason::TimedOut(_))) => {
                ("TIMEOUT", self.styles.fail)
            }
            RunState::Failed(FailureReason::Incomplete(_)) => ("ABORT", self.styles.fail),
            RunState::Failed(FailureReason::SpawnFailed(_) | FailureReason::Decode(_)) => {
                ("ERROR", self.styles.fail)
            }
            // Only terminal states are reported.
            RunState::Unstarted | RunState::Queued | RunState::Running => {
                (state.name(), self.styles.count)
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    package: Style,
    test_name: Style,
}

impl Styles {
    pub(crate) fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.package = Style::new().magenta().bold();
        self.test_name = Style::new().blue().bold();
    }
}
