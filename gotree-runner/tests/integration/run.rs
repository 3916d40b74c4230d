// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure, eyre};
use gotree_runner::{
    catalog::{EntryId, FailureReason, IncompleteReason, NodeId, PassKind, RunState},
    runner::BatchSummary,
    session::{ActivateOutcome, ExplorerContext, Session},
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_case::test_case;

async fn start(ctx: ExplorerContext) -> Result<Session> {
    Ok(Session::start(ctx).await?)
}

fn entry_id(session: &Session, package: &str, name: &str) -> Result<EntryId> {
    session
        .catalog()
        .find(package, name)
        .map(|entry| entry.id())
        .ok_or_else(|| eyre!("{package} {name} not found"))
}

#[tokio::test]
async fn selected_test_passes_with_output() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let mut session = start(go.context()).await?;
    let id = entry_id(&session, PKG_A, "TestPass")?;

    session.on_toggle_select(NodeId::Entry(id));
    let handle = session
        .on_run_requested()
        .ok_or_else(|| eyre!("one test is selected"))?;
    let summary = handle.wait().await;
    session.sync();

    assert_eq!(
        summary,
        BatchSummary {
            passed: 1,
            skipped: 0,
            failed: 0,
        }
    );
    let entry = session.catalog().entry(id).expect("entry exists");
    assert_eq!(entry.run_state(), &RunState::Passed(PassKind::Ok));
    assert_eq!(entry.captured_output(), "ok\n");

    Ok(())
}

#[tokio::test]
async fn run_without_verdict_is_incomplete() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let mut session = start(go.context()).await?;
    let id = entry_id(&session, PKG_A, "TestIncomplete")?;

    let summary = match session.on_activate(NodeId::Entry(id)) {
        ActivateOutcome::Dispatched(handle) => handle.wait().await,
        other => return Err(eyre!("expected dispatch, found {other:?}")),
    };
    assert_eq!(summary.failed, 1);
    session.sync();

    let entry = session.catalog().entry(id).expect("entry exists");
    assert_eq!(
        entry.run_state(),
        &RunState::Failed(FailureReason::Incomplete(IncompleteReason::Exited(2)))
    );
    assert_eq!(
        entry.captured_output(),
        "=== RUN   TestIncomplete\npanic: boom\n",
        "stderr is appended when there's no verdict"
    );

    Ok(())
}

#[tokio::test]
async fn states_are_applied_in_order() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let mut session = start(go.context()).await?;
    let id = entry_id(&session, PKG_B, "TestSubtests")?;

    session.on_toggle_select(NodeId::Entry(id));
    let handle = session
        .on_run_requested()
        .ok_or_else(|| eyre!("one test is selected"))?;

    let mut observed = vec![session.catalog().entry(id).expect("exists").run_state().clone()];
    let mut output_lengths = vec![0];
    while !observed.last().is_some_and(RunState::is_terminal) {
        ensure!(
            session.sync_next().await.is_some(),
            "bridge closed before the run finished"
        );
        let entry = session.catalog().entry(id).expect("exists");
        if observed.last() != Some(entry.run_state()) {
            observed.push(entry.run_state().clone());
        }
        output_lengths.push(entry.captured_output().len());
    }
    handle.wait().await;

    assert_eq!(
        observed,
        vec![
            RunState::Unstarted,
            RunState::Queued,
            RunState::Running,
            RunState::Failed(FailureReason::Assertion),
        ]
    );
    ensure!(
        output_lengths.windows(2).all(|pair| pair[0] <= pair[1]),
        "output only grows during a run: {output_lengths:?}"
    );
    let entry = session.catalog().entry(id).expect("exists");
    assert_eq!(
        entry.captured_output(),
        "=== RUN   TestSubtests\n    sub_test.go:9: one failed\n--- FAIL: TestSubtests (0.00s)\n",
        "subtest output is attributed, other tests' output isn't"
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sibling_failures_are_independent() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let mut session = start(go.context()).await?;
    let count = session.selection().select_matching("Test");
    assert_eq!(count, 6);
    let slow = entry_id(&session, PKG_B, "TestSlow")?;
    session.selection().set(slow, false);

    let summary = session
        .on_run_requested()
        .ok_or_else(|| eyre!("tests are selected"))?
        .wait()
        .await;
    session.sync();

    assert_eq!(
        summary,
        BatchSummary {
            passed: 1,
            skipped: 1,
            failed: 3,
        }
    );
    let states: Vec<_> = session
        .catalog()
        .entries()
        .map(|entry| (entry.name(), entry.run_state().name()))
        .collect();
    assert_eq!(
        states,
        vec![
            ("TestPass", "passed"),
            ("TestSkip", "skipped"),
            ("TestIncomplete", "incomplete"),
            ("TestGarbage", "decode-failed"),
            ("TestSlow", "unstarted"),
            ("TestSubtests", "failed"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn rerun_clears_previous_output() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let mut session = start(go.context()).await?;
    let id = entry_id(&session, PKG_A, "TestPass")?;
    session.on_toggle_select(NodeId::Entry(id));

    for _ in 0..2 {
        session
            .on_run_requested()
            .ok_or_else(|| eyre!("one test is selected"))?
            .wait()
            .await;
        session.sync();
        let entry = session.catalog().entry(id).expect("exists");
        assert_eq!(entry.captured_output(), "ok\n", "no leakage between runs");
        assert_eq!(entry.run_state(), &RunState::Passed(PassKind::Ok));
    }

    Ok(())
}

#[tokio::test]
async fn run_timeout_kills_the_process() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let timeout = Duration::from_millis(300);
    let mut session = start(go.context_with_timeout(Some(timeout))).await?;
    let id = entry_id(&session, PKG_B, "TestSlow")?;
    session.on_toggle_select(NodeId::Entry(id));

    let summary = tokio::time::timeout(
        Duration::from_secs(20),
        session
            .on_run_requested()
            .ok_or_else(|| eyre!("one test is selected"))?
            .wait(),
    )
    .await?;
    assert_eq!(summary.failed, 1);
    session.sync();

    let entry = session.catalog().entry(id).expect("exists");
    assert_eq!(
        entry.run_state(),
        &RunState::Failed(FailureReason::Incomplete(IncompleteReason::TimedOut(
            timeout
        )))
    );

    Ok(())
}

#[test_case("TestClosesStdout"; "process keeps running after closing stdout")]
#[test_case("TestHoldsStderr"; "exited process leaves stderr open")]
#[tokio::test]
async fn run_timeout_covers_the_whole_run(name: &str) -> Result<()> {
    test_init();

    let go = FakeGo::new(LINGERING_GO)?;
    let timeout = Duration::from_millis(300);
    let mut session = start(go.context_with_timeout(Some(timeout))).await?;
    let id = entry_id(&session, PKG_A, name)?;

    let handle = match session.on_activate(NodeId::Entry(id)) {
        ActivateOutcome::Dispatched(handle) => handle,
        other => return Err(eyre!("expected dispatch, found {other:?}")),
    };
    // The stand-in lingers for 10 seconds.
    let summary = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await?;
    assert_eq!(summary.failed, 1);
    session.sync();

    let entry = session.catalog().entry(id).expect("exists");
    assert_eq!(
        entry.run_state(),
        &RunState::Failed(FailureReason::Incomplete(IncompleteReason::TimedOut(
            timeout
        )))
    );

    Ok(())
}
