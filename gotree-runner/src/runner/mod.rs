// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running selected tests.
//!
//! The main structure in this module is [`RunDispatcher`].

mod executor;
mod record;

use self::executor::{RunUnit, execute_unit};
use crate::{
    bridge::{EntryUpdateKind, UiBridge},
    catalog::{Catalog, EntryId, PassKind, RunId, RunState},
    selection::selected_ids,
    session::ExplorerContext,
};
use future_queue::{FutureQueueContext, StreamExt as _};
use futures::{StreamExt as _, stream};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, warn};

/// Dispatches test runs onto a tokio runtime.
///
/// Each entry in a batch gets its own `go test` subprocess. Batches are independent of each
/// other; within a batch, at most `max-concurrent-runs` subprocesses run at a time.
#[derive(Debug)]
pub struct RunDispatcher {
    ctx: Arc<ExplorerContext>,
    bridge: UiBridge,
    handle: Handle,
    next_run: AtomicU64,
}

impl RunDispatcher {
    /// Creates a new dispatcher that spawns work onto the runtime behind `handle`.
    pub fn new(ctx: Arc<ExplorerContext>, bridge: UiBridge, handle: Handle) -> Self {
        Self {
            ctx,
            bridge,
            handle,
            next_run: AtomicU64::new(1),
        }
    }

    /// Runs every selected entry in the catalog. Doesn't block.
    pub fn run_selected(&self, catalog: &Catalog) -> DispatchHandle {
        self.run_entries(catalog, selected_ids(catalog))
    }

    /// Runs the given entries. Doesn't block.
    ///
    /// `Queued` is published for every known entry, in order, before this returns. Unknown IDs
    /// are skipped.
    pub fn run_entries(
        &self,
        catalog: &Catalog,
        ids: impl IntoIterator<Item = EntryId>,
    ) -> DispatchHandle {
        let units: Vec<_> = ids
            .into_iter()
            .filter_map(|id| catalog.entry(id))
            .map(|entry| {
                let run = RunId(self.next_run.fetch_add(1, Ordering::Relaxed));
                self.bridge
                    .schedule_for(entry.id(), EntryUpdateKind::Queued { run });
                RunUnit {
                    entry: entry.id(),
                    run,
                    package: entry.package_name().to_owned(),
                    test: entry.name().to_owned(),
                }
            })
            .collect();

        let queued = units.len();
        let max_concurrent = self.ctx.config().max_concurrent_runs().compute();
        info!("dispatching {queued} tests ({max_concurrent} at a time)");

        let ctx = self.ctx.clone();
        let bridge = self.bridge.clone();
        let join = self.handle.spawn(async move {
            let states: Vec<RunState> = stream::iter(units.into_iter().map(|unit| {
                let ctx = ctx.clone();
                let bridge = bridge.clone();
                (1, move |_cx: FutureQueueContext| async move {
                    execute_unit(&ctx, &bridge, unit).await
                })
            }))
            // Runs are started in order, but may finish in any order.
            .future_queue(max_concurrent)
            .collect()
            .await;

            let summary = BatchSummary::from_states(&states);
            debug!(%summary, "batch finished");
            summary
        });

        DispatchHandle { queued, join }
    }
}

/// A handle to a batch of runs started by a [`RunDispatcher`].
///
/// Dropping the handle doesn't cancel the batch.
#[derive(Debug)]
pub struct DispatchHandle {
    queued: usize,
    join: JoinHandle<BatchSummary>,
}

impl DispatchHandle {
    /// Returns the number of entries queued in this batch.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Waits for every run in the batch to finish.
    ///
    /// Every terminal state has been scheduled on the bridge by the time this returns.
    pub async fn wait(self) -> BatchSummary {
        match self.join.await {
            Ok(summary) => summary,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => {
                warn!("test batch was cancelled: {error}");
                BatchSummary::default()
            }
        }
    }
}

/// Counts of terminal states in a finished batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchSummary {
    /// Entries that passed.
    pub passed: usize,

    /// Entries that were skipped by the test itself.
    pub skipped: usize,

    /// Entries that failed for any reason.
    pub failed: usize,
}

impl BatchSummary {
    fn from_states<'a>(states: impl IntoIterator<Item = &'a RunState>) -> Self {
        let mut summary = Self::default();
        for state in states {
            match state {
                RunState::Passed(PassKind::Ok) => summary.passed += 1,
                RunState::Passed(PassKind::Skipped) => summary.skipped += 1,
                RunState::Failed(_) => summary.failed += 1,
                RunState::Unstarted | RunState::Queued | RunState::Running => {
                    // execute_unit always returns a terminal state.
                }
            }
        }
        summary
    }

    /// Returns the number of entries that finished.
    pub fn total(&self) -> usize {
        self.passed + self.skipped + self.failed
    }

    /// Returns true if no entry failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} skipped, {} failed",
            self.passed, self.skipped, self.failed
        )
    }
}
