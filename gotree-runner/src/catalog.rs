// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The hierarchical package → test model.
//!
//! A [`Catalog`] is populated once by [discovery](crate::discovery) and is structurally immutable
//! afterwards: packages and entries are never added or removed. Only the selection flag, run state
//! and captured output of existing entries change, and those only through
//! [`Catalog::apply`], which the presentation thread calls while draining the
//! [bridge](crate::bridge).

use crate::bridge::{EntryUpdate, EntryUpdateKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::{fmt, time::Duration};
use tracing::debug;

/// Identifies a [`TestEntry`] within a [`Catalog`].
///
/// Identifiers are positional, and remain valid for the lifetime of the catalog since its
/// structure never changes after discovery.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntryId {
    /// The index of the package group.
    pub package: usize,

    /// The index of the entry within its package group.
    pub index: usize,
}

/// The payload attached to a node in the presentation tree.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NodeId {
    /// A package group, by index.
    Package(usize),

    /// A single test entry.
    Entry(EntryId),
}

/// A resolved [`NodeId`].
#[derive(Clone, Copy, Debug)]
pub enum NodeRef<'a> {
    /// A package group.
    Package(&'a PackageGroup),

    /// A single test entry.
    Entry(&'a TestEntry),
}

/// Identifies one run of one entry.
///
/// Run IDs are issued in increasing order by the dispatcher. An entry only accepts updates from
/// its most recently queued run, so a run that is replaced by a newer one can't corrupt the
/// newer run's state.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// The run state of a [`TestEntry`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum RunState {
    /// The entry hasn't been run during this session.
    #[default]
    Unstarted,

    /// The entry has been dispatched but its subprocess hasn't started yet.
    Queued,

    /// The entry's subprocess is running.
    Running,

    /// The entry passed.
    Passed(PassKind),

    /// The entry failed.
    Failed(FailureReason),
}

impl RunState {
    /// Returns true if this is a terminal state: no further transition happens for this run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed(_) | Self::Failed(_))
    }

    /// Returns true if a run is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// A short, stable name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Passed(PassKind::Ok) => "passed",
            Self::Passed(PassKind::Skipped) => "skipped",
            Self::Failed(FailureReason::Assertion) => "failed",
            Self::Failed(FailureReason::Incomplete(_)) => "incomplete",
            Self::Failed(FailureReason::SpawnFailed(_)) => "spawn-failed",
            Self::Failed(FailureReason::Decode(_)) => "decode-failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// How an entry passed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassKind {
    /// The test ran and passed.
    Ok,

    /// The test was skipped by the test itself.
    Skipped,
}

/// Why an entry failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureReason {
    /// The test tool reported a failure for this test.
    Assertion,

    /// The subprocess ended without reporting a verdict for this test.
    Incomplete(IncompleteReason),

    /// The subprocess could not be started.
    SpawnFailed(String),

    /// The subprocess produced a stream that could not be decoded.
    Decode(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assertion => write!(f, "test failed"),
            Self::Incomplete(reason) => write!(f, "no verdict reported ({reason})"),
            Self::SpawnFailed(message) => write!(f, "could not start: {message}"),
            Self::Decode(message) => write!(f, "invalid event stream: {message}"),
        }
    }
}

/// Why a run ended without a verdict.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IncompleteReason {
    /// The subprocess exited with the given code.
    Exited(i32),

    /// The subprocess was terminated by a signal.
    Signaled,

    /// The run was killed after exceeding the configured timeout.
    TimedOut(Duration),
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "process exited with code {code}"),
            Self::Signaled => write!(f, "process terminated by signal"),
            Self::TimedOut(timeout) => write!(f, "timed out after {timeout:?}"),
        }
    }
}

/// One discoverable test.
#[derive(Clone, Debug)]
pub struct TestEntry {
    id: EntryId,
    name: String,
    package_name: String,
    run_state: RunState,
    selected: bool,
    captured_output: String,
    current_run: Option<RunId>,
}

impl TestEntry {
    fn new(id: EntryId, name: String, package_name: String) -> Self {
        Self {
            id,
            name,
            package_name,
            run_state: RunState::Unstarted,
            selected: false,
            captured_output: String::new(),
            current_run: None,
        }
    }

    /// Returns the identifier for this entry.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Returns the qualified name of this test, unique within its package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the package this test belongs to.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Returns the current run state.
    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    /// Returns true if this entry is marked for execution.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Returns output captured during the most recent run.
    pub fn captured_output(&self) -> &str {
        &self.captured_output
    }

    /// Returns the most recently queued run for this entry.
    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// A named, ordered collection of entries for one package.
#[derive(Clone, Debug)]
pub struct PackageGroup {
    index: usize,
    name: String,
    entries: Vec<TestEntry>,
}

impl PackageGroup {
    /// Returns the index of this group within the catalog.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entries in discovery order.
    pub fn entries(&self) -> &[TestEntry] {
        &self.entries
    }
}

/// The root of the package → test hierarchy.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    packages: Vec<PackageGroup>,
    package_indexes: IndexMap<String, usize>,
    test_count: usize,
}

/// The result of applying an [`EntryUpdate`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    /// The update changed the entry.
    Applied,

    /// The update was from a run that has since been replaced.
    Stale,

    /// The update doesn't follow from the entry's current state and was ignored.
    OutOfOrder,

    /// The update referred to an entry that doesn't exist.
    UnknownEntry,
}

impl Catalog {
    /// Returns the package groups, in first-seen order.
    pub fn packages(&self) -> &[PackageGroup] {
        &self.packages
    }

    /// Returns the total number of entries.
    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.test_count == 0
    }

    /// Iterates over all entries, grouped by package in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = &TestEntry> + '_ {
        self.packages.iter().flat_map(|package| package.entries.iter())
    }

    /// Looks up an entry.
    pub fn entry(&self, id: EntryId) -> Option<&TestEntry> {
        self.packages.get(id.package)?.entries.get(id.index)
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Option<&mut TestEntry> {
        self.packages.get_mut(id.package)?.entries.get_mut(id.index)
    }

    /// Looks up a package group by name.
    pub fn package_by_name(&self, name: &str) -> Option<&PackageGroup> {
        let index = *self.package_indexes.get(name)?;
        self.packages.get(index)
    }

    /// Looks up an entry by package and test name.
    pub fn find(&self, package: &str, name: &str) -> Option<&TestEntry> {
        self.package_by_name(package)?
            .entries
            .iter()
            .find(|entry| entry.name == name)
    }

    /// Resolves a presentation node.
    pub fn node(&self, node: NodeId) -> Option<NodeRef<'_>> {
        match node {
            NodeId::Package(index) => self.packages.get(index).map(NodeRef::Package),
            NodeId::Entry(id) => self.entry(id).map(NodeRef::Entry),
        }
    }

    /// Adds an entry during discovery, creating its package group if necessary.
    ///
    /// Returns `None` if an entry with this package and name already exists.
    pub(crate) fn push_entry(&mut self, package: &str, name: &str) -> Option<EntryId> {
        let package_index = match self.package_indexes.get(package) {
            Some(&index) => index,
            None => {
                let index = self.packages.len();
                self.packages.push(PackageGroup {
                    index,
                    name: package.to_owned(),
                    entries: Vec::new(),
                });
                self.package_indexes.insert(package.to_owned(), index);
                index
            }
        };

        let group = &mut self.packages[package_index];
        if group.entries.iter().any(|entry| entry.name == name) {
            return None;
        }

        let id = EntryId {
            package: package_index,
            index: group.entries.len(),
        };
        group
            .entries
            .push(TestEntry::new(id, name.to_owned(), package.to_owned()));
        self.test_count += 1;
        Some(id)
    }

    /// Applies an update produced by background work.
    ///
    /// This must only be called on the presentation thread, which is the sole owner of the
    /// catalog's mutable state.
    pub fn apply(&mut self, update: EntryUpdate) -> ApplyOutcome {
        let EntryUpdate { entry: id, kind } = update;
        let Some(entry) = self.entry_mut(id) else {
            debug!(?id, "ignoring update for unknown entry");
            return ApplyOutcome::UnknownEntry;
        };

        match kind {
            EntryUpdateKind::SetSelected(selected) => {
                entry.selected = selected;
                ApplyOutcome::Applied
            }
            EntryUpdateKind::Queued { run } => {
                if entry.current_run.is_some_and(|current| current > run) {
                    return ApplyOutcome::Stale;
                }
                if entry.run_state.is_in_flight() {
                    debug!(
                        test = %entry.name,
                        previous = ?entry.current_run,
                        %run,
                        "replacing in-flight run record",
                    );
                }
                // Resetting the output and the state happen together, so no append from an
                // older run can land between them.
                entry.current_run = Some(run);
                entry.run_state = RunState::Queued;
                entry.captured_output.clear();
                ApplyOutcome::Applied
            }
            EntryUpdateKind::Running { run } => {
                if entry.current_run != Some(run) {
                    return ApplyOutcome::Stale;
                }
                if entry.run_state != RunState::Queued {
                    debug!(test = %entry.name, state = %entry.run_state, "ignoring running update");
                    return ApplyOutcome::OutOfOrder;
                }
                entry.run_state = RunState::Running;
                ApplyOutcome::Applied
            }
            EntryUpdateKind::Output { run, fragment } => {
                if entry.current_run != Some(run) {
                    return ApplyOutcome::Stale;
                }
                if !entry.run_state.is_in_flight() {
                    debug!(test = %entry.name, state = %entry.run_state, "ignoring late output");
                    return ApplyOutcome::OutOfOrder;
                }
                entry.captured_output.push_str(&fragment);
                ApplyOutcome::Applied
            }
            EntryUpdateKind::Finished { run, state } => {
                if entry.current_run != Some(run) {
                    return ApplyOutcome::Stale;
                }
                if !entry.run_state.is_in_flight() || !state.is_terminal() {
                    debug!(
                        test = %entry.name,
                        from = %entry.run_state,
                        to = %state,
                        "ignoring finished update",
                    );
                    return ApplyOutcome::OutOfOrder;
                }
                debug!(test = %entry.name, %run, state = %state, "run finished");
                entry.run_state = state;
                ApplyOutcome::Applied
            }
        }
    }

    /// Returns a serializable summary of the catalog.
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            test_count: self.test_count,
            packages: self
                .packages
                .iter()
                .map(|package| {
                    let tests = package
                        .entries
                        .iter()
                        .map(|entry| TestSummary {
                            name: entry.name.clone(),
                            state: entry.run_state.name(),
                            selected: entry.selected,
                        })
                        .collect();
                    (package.name.clone(), tests)
                })
                .collect(),
        }
    }
}

/// A machine-readable summary of a [`Catalog`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogSummary {
    /// The total number of tests.
    pub test_count: usize,

    /// Tests by package, in first-seen order.
    pub packages: IndexMap<String, Vec<TestSummary>>,
}

/// A machine-readable summary of a [`TestEntry`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestSummary {
    /// The name of the test.
    pub name: String,

    /// The run state, as returned by [`RunState::name`].
    pub state: &'static str,

    /// Whether the test is selected.
    pub selected: bool,
}
