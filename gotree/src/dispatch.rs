// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
    reporter::{MessageFormat, RunReporter, Styles, write_list},
    ui,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use gotree_metadata::GotreeExitCode;
use gotree_runner::{
    catalog::ApplyOutcome,
    config::{ExplorerConfig, MaxConcurrentRuns},
    discovery::discover,
    session::{ExplorerContext, Session},
};
use std::io::Write;
use supports_color::Stream;
use tokio::runtime::Runtime;
use tracing::debug;

/// An interactive explorer for Go test suites.
///
/// With no subcommand, gotree discovers the tests under DIR and opens a terminal UI for browsing,
/// selecting and running them.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = clap_styles::style(),
    args_conflicts_with_subcommands = true
)]
pub struct GotreeApp {
    /// Directory to run `go test` in [default: current directory]
    #[arg(value_name = "DIR")]
    dir: Option<Utf8PathBuf>,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: DIR/.config/gotree.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Package pattern passed to `go test -list`
    #[arg(
        long,
        global = true,
        value_name = "PATTERN",
        default_value = ExplorerContext::DEFAULT_SCOPE
    )]
    scope: String,
}

impl ConfigOpts {
    fn make_config(&self, root_dir: &Utf8Path) -> Result<ExplorerConfig, ExpectedError> {
        Ok(ExplorerConfig::from_sources(
            root_dir,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the tests under a directory
    ///
    /// Use --message-format json to get machine-readable output.
    List {
        /// Directory to run `go test` in [default: current directory]
        #[arg(value_name = "DIR")]
        dir: Option<Utf8PathBuf>,

        /// Output format
        #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,
    },
    /// Run tests without the terminal UI
    ///
    /// Each test runs in its own `go test` process. Results are printed as they finish.
    Run {
        /// Directory to run `go test` in [default: current directory]
        #[arg(value_name = "DIR")]
        dir: Option<Utf8PathBuf>,

        /// Only run tests whose names contain this text
        #[arg(short = 'E', long, value_name = "TEXT")]
        filter: Option<String>,

        /// Number of tests to run simultaneously [default: from config]
        #[arg(short = 'j', long, value_name = "N")]
        max_concurrent_runs: Option<MaxConcurrentRuns>,
    },
}

impl GotreeApp {
    /// Initializes the output context, including logging.
    pub fn init_output(&self) -> Result<OutputContext, ExpectedError> {
        self.output.init(self.command.is_none())
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(
        self,
        output: OutputContext,
        writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let dir = match &self.command {
            Some(Command::List { dir, .. } | Command::Run { dir, .. }) => dir.as_deref(),
            None => self.dir.as_deref(),
        };
        let root_dir = resolve_root_dir(dir)?;
        let mut config = self.config_opts.make_config(&root_dir)?;

        let mut styles = Styles::default();
        let runtime = make_runtime()?;

        match self.command {
            Some(Command::List { message_format, .. }) => {
                let ctx = ExplorerContext::new(root_dir, self.config_opts.scope, config);
                let catalog = runtime.block_on(discover(&ctx))?;

                if output.color.should_colorize(Stream::Stdout) {
                    styles.colorize();
                }
                write_list(
                    &catalog,
                    message_format,
                    &styles,
                    writer.stdout_writer(),
                )
                .map_err(|err| ExpectedError::WriteOutputError { err })?;
                Ok(GotreeExitCode::OK)
            }
            Some(Command::Run {
                filter,
                max_concurrent_runs,
                ..
            }) => {
                if let Some(max) = max_concurrent_runs {
                    config.set_max_concurrent_runs(max);
                }
                if output.color.should_colorize(Stream::Stderr) {
                    styles.colorize();
                }
                let ctx = ExplorerContext::new(root_dir, self.config_opts.scope, config);
                runtime.block_on(run_headless(
                    ctx,
                    filter,
                    RunReporter::new(styles),
                    writer,
                ))
            }
            None => {
                let ctx = ExplorerContext::new(root_dir, self.config_opts.scope, config);
                ui::run_interactive(&runtime, ctx)?;
                Ok(GotreeExitCode::OK)
            }
        }
    }
}

async fn run_headless(
    ctx: ExplorerContext,
    filter: Option<String>,
    reporter: RunReporter,
    writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let mut session = Session::start(ctx).await?;
    match &filter {
        Some(filter) => {
            session.selection().select_matching(filter);
        }
        None => session.selection().select_everything(),
    }
    let Some(handle) = session.on_run_requested() else {
        return Err(ExpectedError::NoTestsRun { filter });
    };

    let mut writer = writer.stderr_writer();
    let write_err = |err: std::io::Error| ExpectedError::WriteOutputError { err };

    reporter
        .write_started(handle.queued(), &mut writer)
        .map_err(write_err)?;

    let mut remaining = handle.queued();
    while remaining > 0 {
        let Some((id, outcome)) = session.sync_next().await else {
            break;
        };
        if outcome != ApplyOutcome::Applied {
            continue;
        }
        let Some(entry) = session.catalog().entry(id) else {
            continue;
        };
        if entry.run_state().is_terminal() {
            reporter
                .write_finished(entry, &mut writer)
                .and_then(|()| writer.flush())
                .map_err(write_err)?;
            remaining -= 1;
        }
    }

    let summary = handle.wait().await;
    debug!(%summary, "headless run finished");
    reporter
        .write_summary(&summary, &mut writer)
        .map_err(write_err)?;

    if summary.is_success() {
        Ok(GotreeExitCode::OK)
    } else {
        Err(ExpectedError::TestRunFailed)
    }
}

fn resolve_root_dir(dir: Option<&Utf8Path>) -> Result<Utf8PathBuf, ExpectedError> {
    let dir = match dir {
        Some(dir) => dir.to_owned(),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
            Utf8PathBuf::try_from(cwd).map_err(|err| ExpectedError::CurrentDirInvalid {
                err: err.into_io_error(),
            })?
        }
    };
    if !dir.is_dir() {
        return Err(ExpectedError::RootDirNotFound { path: dir });
    }
    Ok(dir)
}

fn make_runtime() -> Result<Runtime, ExpectedError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("gotree-worker")
        .build()
        .map_err(|err| ExpectedError::RuntimeCreateError { err })
}
