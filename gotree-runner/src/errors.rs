// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by gotree.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error as StdError, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse gotree config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error which indicates that a value for `max-concurrent-runs` couldn't be parsed.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for max-concurrent-runs: {input}\n\
     (hint: expected a positive integer or \"num-cpus\")"
)]
pub struct MaxRunsParseError {
    input: String,
}

impl MaxRunsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while decoding a `go test -json` event stream.
///
/// A decode error is fatal for the stream that produced it, but never for the session: the
/// error is attributed to the discovery or run that owns the stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A line in the stream was not a valid test event.
    #[error("line {line_number} is not a valid test event: `{line}`")]
    Parse {
        /// The 1-based line number within the stream.
        line_number: usize,

        /// The contents of the offending line.
        line: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// Reading from the underlying stream failed.
    #[error("error reading test event stream after line {line_number}")]
    Read {
        /// The number of lines successfully read before the error.
        line_number: usize,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurs while discovering the list of tests.
///
/// Discovery errors are fatal to the session: gotree does not show an empty catalog in place of
/// one it failed to build.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The listing command could not be started.
    #[error("failed to start test discovery")]
    Spawn(#[source] SpawnError),

    /// Waiting for the listing command to exit failed.
    #[error("error waiting for listing command `{}` to exit", shell_words::join(.command))]
    Wait {
        /// The command that was run.
        command: Vec<String>,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The listing command produced an undecodable stream.
    #[error("listing command `{}` produced invalid output", shell_words::join(.command))]
    Decode {
        /// The command that was run.
        command: Vec<String>,

        /// The underlying error.
        #[source]
        error: DecodeError,
    },

    /// The listing command exited with a failure.
    #[error(
        "listing command `{}` failed{}\nstderr:\n{stderr}",
        shell_words::join(.command),
        display_exit_code(*.exit_code),
    )]
    Failed {
        /// The command that was run.
        command: Vec<String>,

        /// The exit code, or `None` if the process was terminated by a signal.
        exit_code: Option<i32>,

        /// Standard error for the process, decoded lossily.
        stderr: String,
    },
}

/// An error that occurs while spawning a test run.
///
/// This is only ever reported against the single entry whose run failed to start.
#[derive(Debug, Error)]
#[error("failed to spawn `{}`", shell_words::join(.command))]
pub struct SpawnError {
    command: Vec<String>,
    #[source]
    error: io::Error,
}

impl SpawnError {
    pub(crate) fn new(command: Vec<String>, error: io::Error) -> Self {
        Self { command, error }
    }

    /// Returns the command line that failed to start.
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

fn display_exit_code(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_owned(),
    }
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: StdError> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E> fmt::Display for DisplayErrorChain<E>
where
    E: StdError,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
