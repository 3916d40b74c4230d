// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    catalog::{FailureReason, PassKind, RunState},
    events::TestEventRecordExt,
};
use gotree_metadata::{TestAction, TestEventRecord};
use tracing::trace;

/// What an event in a run's stream means for the entry being run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum Attribution {
    /// Output to append to the entry's captured output.
    Output(String),

    /// The entry reached its verdict.
    Verdict(RunState),
}

/// Attribution state for the stream of a single run.
///
/// Output is attributed if the event names the entry itself or one of its subtests. Verdicts are
/// only taken from events naming the entry exactly, since subtests report their own. Once a
/// verdict has been seen, nothing further is attributed.
#[derive(Debug)]
pub(super) struct RunRecord {
    package: String,
    test: String,
    verdict: Option<RunState>,
    ignored: usize,
}

impl RunRecord {
    pub(super) fn new(package: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            test: test.into(),
            verdict: None,
            ignored: 0,
        }
    }

    pub(super) fn observe(&mut self, record: TestEventRecord) -> Option<Attribution> {
        if self.verdict.is_some() || !record.is_for_test_or_subtest(&self.package, &self.test) {
            self.ignored += 1;
            return None;
        }

        let exact = record.is_for_test(&self.package, &self.test);
        match record.action {
            TestAction::Output => record.output.map(Attribution::Output),
            TestAction::Pass if exact => self.set_verdict(RunState::Passed(PassKind::Ok)),
            TestAction::Skip if exact => self.set_verdict(RunState::Passed(PassKind::Skipped)),
            TestAction::Fail if exact => {
                self.set_verdict(RunState::Failed(FailureReason::Assertion))
            }
            action => {
                trace!(test = %self.test, %action, "event carries no attribution");
                None
            }
        }
    }

    /// Returns the verdict, if one has been reported.
    pub(super) fn verdict(&self) -> Option<&RunState> {
        self.verdict.as_ref()
    }

    /// Returns the number of events that didn't belong to this run's entry.
    pub(super) fn ignored(&self) -> usize {
        self.ignored
    }

    fn set_verdict(&mut self, state: RunState) -> Option<Attribution> {
        self.verdict = Some(state.clone());
        Some(Attribution::Verdict(state))
    }
}
