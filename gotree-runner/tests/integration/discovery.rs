// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, bail, ensure};
use gotree_runner::{
    catalog::RunState, discovery::discover, errors::DiscoveryError, session::ExplorerContext,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn discovery_groups_tests_by_package() -> Result<()> {
    test_init();

    let go = FakeGo::new(FAKE_GO)?;
    let catalog = discover(&go.context()).await?;

    let layout: Vec<_> = catalog
        .packages()
        .iter()
        .map(|group| {
            let names: Vec<_> = group.entries().iter().map(|entry| entry.name()).collect();
            (group.name(), names)
        })
        .collect();
    assert_eq!(
        layout,
        vec![
            (PKG_A, vec!["TestPass", "TestSkip", "TestIncomplete"]),
            (PKG_B, vec!["TestGarbage", "TestSlow", "TestSubtests"]),
        ]
    );
    for entry in catalog.entries() {
        ensure!(
            entry.run_state() == &RunState::Unstarted && !entry.is_selected(),
            "fresh entries are unstarted and unselected: {entry:?}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn discovery_passes_scope_and_runs_in_root() -> Result<()> {
    test_init();

    // Echo the arguments and working directory back as test names.
    let go = FakeGo::new(
        r#"
printf '{"Action":"output","Package":"p","Output":"Test-%s\\n"}\n' "$4"
printf '{"Action":"output","Package":"p","Output":"Test-cwd:%s\\n"}\n' "$(pwd -P)"
"#,
    )?;
    let base = go.context();
    let ctx = ExplorerContext::new(base.root_dir(), "./internal/...", base.config().clone());
    let catalog = discover(&ctx).await?;

    let names: Vec<_> = catalog.entries().map(|entry| entry.name().to_owned()).collect();
    let root = std::fs::canonicalize(go.root_dir())?;
    assert_eq!(
        names,
        vec![
            "Test-./internal/...".to_owned(),
            format!("Test-cwd:{}", root.display()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn discovery_with_no_tests() -> Result<()> {
    test_init();

    let go = FakeGo::new(
        r#"printf '%s\n' '{"Action":"output","Package":"p","Output":"?   \tp\t[no test files]\n"}'"#,
    )?;
    let catalog = discover(&go.context()).await?;
    ensure!(catalog.is_empty(), "no tests were listed");

    let go = FakeGo::new("exit 0")?;
    let catalog = discover(&go.context()).await?;
    ensure!(catalog.packages().is_empty(), "no packages were seen");

    Ok(())
}

#[tokio::test]
async fn discovery_exit_failure() -> Result<()> {
    test_init();

    let go = FakeGo::new(
        r#"
printf '%s\n' '{"Action":"output","Package":"p","Output":"TestFoo\n"}'
echo 'go: cannot find main module' >&2
exit 1
"#,
    )?;
    match discover(&go.context()).await {
        Err(DiscoveryError::Failed {
            exit_code, stderr, ..
        }) => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(stderr, "go: cannot find main module\n");
        }
        other => bail!("expected DiscoveryError::Failed, found {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn discovery_undecodable_stream() -> Result<()> {
    test_init();

    let go = FakeGo::new(
        r#"
printf '%s\n' '{"Action":"output","Package":"p","Output":"TestFoo\n"}'
echo 'build failed'
"#,
    )?;
    match discover(&go.context()).await {
        Err(DiscoveryError::Decode { error, .. }) => {
            let message = error.to_string();
            ensure!(
                message.contains("line 2") && message.contains("build failed"),
                "unexpected message: {message}"
            );
        }
        other => bail!("expected DiscoveryError::Decode, found {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn discovery_missing_program() -> Result<()> {
    test_init();

    let go = FakeGo::new("exit 0")?;
    let base = go.context();
    let mut config = base.config().clone();
    config.set_program(go.root_dir().join("not-go").into_string());
    let ctx = ExplorerContext::new(base.root_dir(), ExplorerContext::DEFAULT_SCOPE, config);

    let error = discover(&ctx).await.expect_err("program doesn't exist");
    ensure!(
        matches!(error, DiscoveryError::Spawn(_)),
        "expected a spawn error, found {error:?}"
    );

    Ok(())
}

#[tokio::test]
async fn discovery_decode_error_with_stderr_held_open() -> Result<()> {
    test_init();

    let go = FakeGo::new(
        r#"
sleep 10 >/dev/null &
printf '%s\n' '{"Action":"output","Package":"p","Output":"TestFoo\n"}'
echo 'build failed'
"#,
    )?;
    let res = tokio::time::timeout(Duration::from_secs(5), discover(&go.context())).await?;
    ensure!(
        matches!(res, Err(DiscoveryError::Decode { .. })),
        "expected DiscoveryError::Decode, found {res:?}"
    );

    Ok(())
}
