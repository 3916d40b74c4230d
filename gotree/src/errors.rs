// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use gotree_metadata::GotreeExitCode;
use gotree_runner::errors::{ConfigParseError, DiscoveryError, DisplayErrorChain};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::{error, warn};

/// An error with a known cause, that gotree reports without a backtrace.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("root directory `{path}` not found")]
    RootDirNotFound { path: Utf8PathBuf },
    #[error("failed to open log file `{path}`")]
    LogFileOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to create the tokio runtime")]
    RuntimeCreateError {
        #[source]
        err: std::io::Error,
    },
    #[error("test discovery failed")]
    DiscoveryFailed {
        #[from]
        err: DiscoveryError,
    },
    #[error("no tests to run")]
    NoTestsRun { filter: Option<String> },
    #[error("test run failed")]
    TestRunFailed,
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("error in interactive session")]
    InteractiveError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::RootDirNotFound { .. }
            | Self::LogFileOpenError { .. }
            | Self::ConfigParseError { .. }
            | Self::RuntimeCreateError { .. } => GotreeExitCode::SETUP_ERROR,
            Self::DiscoveryFailed { .. } => GotreeExitCode::DISCOVERY_FAILED,
            Self::NoTestsRun { .. } => GotreeExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => GotreeExitCode::TEST_RUN_FAILED,
            Self::WriteOutputError { .. } => GotreeExitCode::WRITE_OUTPUT_ERROR,
            Self::InteractiveError { .. } => GotreeExitCode::INTERACTIVE_ERROR,
        }
    }

    /// Renders this error and its sources as a plain string, for use before logging is set up.
    pub fn display_chain(&self) -> String {
        DisplayErrorChain::new(self).to_string()
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirInvalid { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::RootDirNotFound { path } => {
                error!("root directory `{}` not found", path.style(styles.bold));
                None
            }
            Self::LogFileOpenError { path, err } => {
                error!("failed to open log file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse gotree config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::RuntimeCreateError { err } => {
                error!("failed to create the tokio runtime");
                Some(err as &dyn Error)
            }
            Self::DiscoveryFailed { err } => {
                error!("test discovery failed");
                Some(err as &dyn Error)
            }
            Self::NoTestsRun { filter } => {
                match filter {
                    Some(filter) => warn!(
                        "no tests matched `{}`",
                        filter.style(styles.warning_text)
                    ),
                    None => warn!("no tests to run"),
                }
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::InteractiveError { err } => {
                error!("error in interactive session");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotree_runner::config::ExplorerConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes() {
        let config_error =
            ExplorerConfig::from_toml_str("bad.toml", "[run]\nmax-concurrent-runs = 0\n")
                .expect_err("zero is invalid");
        let cases = [
            (
                ExpectedError::from(config_error),
                GotreeExitCode::SETUP_ERROR,
            ),
            (
                ExpectedError::from(DiscoveryError::Failed {
                    command: vec!["go".to_owned()],
                    exit_code: Some(1),
                    stderr: String::new(),
                }),
                GotreeExitCode::DISCOVERY_FAILED,
            ),
            (
                ExpectedError::NoTestsRun { filter: None },
                GotreeExitCode::NO_TESTS_RUN,
            ),
            (ExpectedError::TestRunFailed, GotreeExitCode::TEST_RUN_FAILED),
        ];
        for (error, code) in cases {
            assert_eq!(error.process_exit_code(), code, "for {error}");
        }
    }

    #[test]
    fn display_chain_includes_sources() {
        let error = ExpectedError::InteractiveError {
            err: std::io::Error::other("terminal went away"),
        };
        assert_eq!(
            error.display_chain(),
            "error in interactive session\n  caused by:\n  - terminal went away"
        );
    }
}
