// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of the `go test` command lines used for discovery and execution.

use crate::{config::ExplorerConfig, errors::SpawnError};
use camino::Utf8Path;
use std::process::Stdio;
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
};
use tracing::debug;

/// A `go test` invocation, ready to be spawned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCommand {
    program: String,
    args: Vec<String>,
}

impl TestCommand {
    /// The listing invocation: `go test -list=<pattern> -json [extra args] <scope>`.
    pub fn discovery(config: &ExplorerConfig, scope: &str) -> Self {
        let mut args = vec![
            "test".to_owned(),
            format!("-list={}", config.list_pattern()),
            "-json".to_owned(),
        ];
        args.extend(config.extra_args().iter().cloned());
        args.push(scope.to_owned());
        Self {
            program: config.program().to_owned(),
            args,
        }
    }

    /// The execution invocation for a single test:
    /// `go test -run ^<name>$ -json [extra args] <package>`.
    ///
    /// The test name is anchored so that `TestFoo` doesn't also run `TestFooBar`.
    pub fn execution(config: &ExplorerConfig, package: &str, test_name: &str) -> Self {
        let mut args = vec![
            "test".to_owned(),
            "-run".to_owned(),
            format!("^{}$", regex_escape(test_name)),
            "-json".to_owned(),
        ];
        args.extend(config.extra_args().iter().cloned());
        args.push(package.to_owned());
        Self {
            program: config.program().to_owned(),
            args,
        }
    }

    /// Returns the program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the full command line, program first.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Spawns the command in `cwd` with stdout and stderr piped and stdin closed.
    ///
    /// The child is killed if its handle is dropped.
    pub fn spawn(&self, cwd: &Utf8Path) -> Result<Child, SpawnError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.spawn()
            .map_err(|error| SpawnError::new(self.command_line(), error))
    }
}

/// Reads a child's stderr to the end on a separate task.
///
/// Read errors only lose diagnostic text, so they're logged and whatever was read is kept.
pub(crate) fn collect_stderr(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(error) = stderr.read_to_end(&mut buf).await {
            debug!("error reading stderr: {error}");
        }
        buf
    })
}

/// Escapes characters that are special in Go's RE2 syntax.
///
/// Go test names are identifiers in practice, but subtests and `-list` patterns may contain
/// anything.
fn regex_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
