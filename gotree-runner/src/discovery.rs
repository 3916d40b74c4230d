// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test discovery: running `go test -list` and building a [`Catalog`] from its output.

use crate::{
    catalog::Catalog,
    errors::{DecodeError, DiscoveryError},
    events::{EventStream, TestEventRecordExt},
    session::ExplorerContext,
    test_command::{TestCommand, collect_stderr},
};
use gotree_metadata::TestEventRecord;
use tokio::io::BufReader;
use tracing::{debug, info};

/// Builds a [`Catalog`] from listing events.
///
/// Every output event whose fragment starts with the test-name prefix becomes an entry in the
/// package group named by the event. Package groups are created in first-seen order.
#[derive(Debug)]
pub struct CatalogBuilder<'a> {
    prefix: &'a str,
    catalog: Catalog,
}

impl<'a> CatalogBuilder<'a> {
    /// Creates a builder recognizing test names that start with `prefix`.
    pub fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            catalog: Catalog::default(),
        }
    }

    /// Feeds one listing event into the builder.
    pub fn observe(&mut self, record: &TestEventRecord) {
        let Some(name) = record.listed_test_name(self.prefix) else {
            return;
        };
        if self.catalog.push_entry(&record.package, name).is_none() {
            debug!(
                package = %record.package,
                test = name,
                "ignoring duplicate test in listing",
            );
        }
    }

    /// Builds a catalog from an entire decoded stream, stopping at the first error.
    pub fn from_events(
        prefix: &'a str,
        events: impl IntoIterator<Item = Result<TestEventRecord, DecodeError>>,
    ) -> Result<Catalog, DecodeError> {
        let mut builder = Self::new(prefix);
        for record in events {
            builder.observe(&record?);
        }
        Ok(builder.finish())
    }

    /// Finishes building, returning the catalog.
    pub fn finish(self) -> Catalog {
        self.catalog
    }
}

/// Discovers the tests reachable from the session's scope selector.
///
/// The listing stream is decoded as it is produced. Any decode error, or a non-zero exit from the
/// listing command, fails discovery as a whole: there is no partial catalog.
pub async fn discover(ctx: &ExplorerContext) -> Result<Catalog, DiscoveryError> {
    let command = TestCommand::discovery(ctx.config(), ctx.scope());
    debug!(command = ?command.command_line(), cwd = %ctx.root_dir(), "running discovery");

    let mut child = command
        .spawn(ctx.root_dir())
        .map_err(DiscoveryError::Spawn)?;

    let mut stderr_task = child.stderr.take().map(collect_stderr);

    let mut builder = CatalogBuilder::new(ctx.config().test_prefix());
    let mut decode_error = None;
    if let Some(stdout) = child.stdout.take() {
        let mut events = EventStream::new(BufReader::new(stdout));
        while let Some(res) = events.next_event().await {
            match res {
                Ok(record) => builder.observe(&record),
                Err(error) => {
                    decode_error = Some(error);
                    break;
                }
            }
        }
    }

    if decode_error.is_some() {
        // The rest of the stream is discarded, so don't leave the child blocked on a full pipe.
        // stderr isn't reported for decode errors, and a grandchild may keep it open.
        let _ = child.start_kill();
        if let Some(task) = stderr_task.take() {
            task.abort();
        }
    }

    let status = child.wait().await.map_err(|error| DiscoveryError::Wait {
        command: command.command_line(),
        error,
    })?;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    if let Some(error) = decode_error {
        return Err(DiscoveryError::Decode {
            command: command.command_line(),
            error,
        });
    }
    if !status.success() {
        return Err(DiscoveryError::Failed {
            command: command.command_line(),
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        });
    }

    let catalog = builder.finish();
    info!(
        "discovered {} tests across {} packages",
        catalog.test_count(),
        catalog.packages().len(),
    );
    Ok(catalog)
}
