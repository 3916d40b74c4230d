// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-entry unit of work.
//!
//! A unit owns one `go test` subprocess for the lifetime of the run. Everything it learns is
//! published through the bridge, and it always ends by publishing exactly one terminal state for
//! its run.

use super::record::{Attribution, RunRecord};
use crate::{
    bridge::{EntryUpdateKind, UiBridge},
    catalog::{EntryId, FailureReason, IncompleteReason, RunId, RunState},
    errors::{DecodeError, DisplayErrorChain},
    events::EventStream,
    session::ExplorerContext,
    test_command::{TestCommand, collect_stderr},
};
use std::time::Duration;
use tokio::{io::BufReader, process::Child, time::Instant};
use tracing::{debug, warn};

/// Everything a unit of work needs to know about its entry, captured at dispatch time.
#[derive(Clone, Debug)]
pub(super) struct RunUnit {
    pub(super) entry: EntryId,
    pub(super) run: RunId,
    pub(super) package: String,
    pub(super) test: String,
}

/// How reading a run's stdout ended.
enum StreamEnd {
    Eof,
    Decode(DecodeError),
    TimedOut(Duration),
}

/// Runs a single entry to completion and returns its terminal state.
pub(super) async fn execute_unit(
    ctx: &ExplorerContext,
    bridge: &UiBridge,
    unit: RunUnit,
) -> RunState {
    // Running is published before the spawn so that a spawn failure still follows
    // Queued → Running → Failed.
    bridge.schedule_for(unit.entry, EntryUpdateKind::Running { run: unit.run });

    let command = TestCommand::execution(ctx.config(), &unit.package, &unit.test);
    debug!(test = %unit.test, run = %unit.run, command = ?command.command_line(), "starting run");

    match command.spawn(ctx.root_dir()) {
        Ok(child) => drive_child(ctx, bridge, &unit, child).await,
        Err(error) => {
            let message = DisplayErrorChain::new(&error).to_string();
            warn!(test = %unit.test, "{message}");
            finish(
                bridge,
                &unit,
                RunState::Failed(FailureReason::SpawnFailed(message)),
            )
        }
    }
}

async fn drive_child(
    ctx: &ExplorerContext,
    bridge: &UiBridge,
    unit: &RunUnit,
    mut child: Child,
) -> RunState {
    // One deadline covers reading stdout, waiting for the exit, and collecting stderr.
    let deadline = ctx.config().run_timeout().map(Deadline::after);
    let mut stderr_task = child.stderr.take().map(collect_stderr);
    let mut record = RunRecord::new(&unit.package, &unit.test);

    let mut end = match child.stdout.take() {
        Some(stdout) => {
            let events = EventStream::new(BufReader::new(stdout));
            within(deadline, read_stream(bridge, unit, &mut record, events))
                .await
                .unwrap_or_else(StreamEnd::TimedOut)
        }
        None => StreamEnd::Eof,
    };

    // A child may close stdout and keep running.
    let mut status = None;
    if matches!(end, StreamEnd::Eof) {
        match within(deadline, child.wait()).await {
            Ok(res) => status = Some(res),
            Err(timeout) => end = StreamEnd::TimedOut(timeout),
        }
    }

    if !matches!(end, StreamEnd::Eof) {
        // The rest of the stream won't be read, and a grandchild may keep stderr open, so don't
        // wait on either.
        let _ = child.start_kill();
        if let Some(task) = stderr_task.take() {
            task.abort();
        }
    }

    let status = match status {
        Some(status) => status,
        None => child.wait().await,
    };
    let exit_code = match status {
        Ok(status) => status.code(),
        Err(error) => {
            warn!(test = %unit.test, "error waiting for test process: {error}");
            None
        }
    };

    if let Some(verdict) = record.verdict() {
        // Already published as it arrived.
        if let StreamEnd::Decode(error) = &end {
            debug!(test = %unit.test, "ignoring decode error after verdict: {error}");
        }
        if let Some(task) = stderr_task {
            task.abort();
        }
        return verdict.clone();
    }

    if let Some(mut task) = stderr_task {
        match within(deadline, &mut task).await {
            Ok(stderr) => {
                let stderr = stderr.unwrap_or_default();
                if !stderr.is_empty() {
                    bridge.schedule_for(
                        unit.entry,
                        EntryUpdateKind::Output {
                            run: unit.run,
                            fragment: String::from_utf8_lossy(&stderr).into_owned(),
                        },
                    );
                }
            }
            Err(timeout) => {
                // The process exited, but something it started still holds stderr open.
                task.abort();
                end = StreamEnd::TimedOut(timeout);
            }
        }
    }

    let state = match end {
        StreamEnd::Eof => {
            let reason = match exit_code {
                Some(code) => IncompleteReason::Exited(code),
                None => IncompleteReason::Signaled,
            };
            debug!(
                test = %unit.test,
                ignored_events = record.ignored(),
                "stream ended without a verdict ({reason})",
            );
            RunState::Failed(FailureReason::Incomplete(reason))
        }
        StreamEnd::Decode(error) => {
            let message = DisplayErrorChain::new(&error).to_string();
            warn!(test = %unit.test, "{message}");
            RunState::Failed(FailureReason::Decode(message))
        }
        StreamEnd::TimedOut(timeout) => {
            warn!(test = %unit.test, "run timed out after {timeout:?}, killed");
            RunState::Failed(FailureReason::Incomplete(IncompleteReason::TimedOut(
                timeout,
            )))
        }
    };
    finish(bridge, unit, state)
}

/// The point in time at which a run is abandoned.
#[derive(Clone, Copy, Debug)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }
}

/// Awaits `fut`, giving up with the configured timeout once the deadline passes.
async fn within<F: Future>(deadline: Option<Deadline>, fut: F) -> Result<F::Output, Duration> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, fut)
            .await
            .map_err(|_| deadline.timeout),
        None => Ok(fut.await),
    }
}

/// Reads and attributes events until the end of the stream or the first decode error.
///
/// The verdict is published as soon as it's seen; the remainder of the stream is still read so
/// that the child isn't blocked on a full pipe.
async fn read_stream<R>(
    bridge: &UiBridge,
    unit: &RunUnit,
    record: &mut RunRecord,
    mut events: EventStream<R>,
) -> StreamEnd
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    while let Some(res) = events.next_event().await {
        let event = match res {
            Ok(event) => event,
            Err(error) => return StreamEnd::Decode(error),
        };
        match record.observe(event) {
            Some(Attribution::Output(fragment)) => bridge.schedule_for(
                unit.entry,
                EntryUpdateKind::Output {
                    run: unit.run,
                    fragment,
                },
            ),
            Some(Attribution::Verdict(state)) => {
                finish(bridge, unit, state);
            }
            None => {}
        }
    }
    StreamEnd::Eof
}

fn finish(bridge: &UiBridge, unit: &RunUnit, state: RunState) -> RunState {
    bridge.schedule_for(
        unit.entry,
        EntryUpdateKind::Finished {
            run: unit.run,
            state: state.clone(),
        },
    );
    state
}
