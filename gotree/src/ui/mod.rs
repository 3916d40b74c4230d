// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interactive explorer.
//!
//! The UI runs on the main thread. Test runs happen on the tokio runtime and report back through
//! the session's bridge, which is drained once per frame.

mod app;
mod render;
mod tree;

use crate::ExpectedError;
use app::App;
use gotree_runner::session::{ExplorerContext, Session};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    crossterm::{
        cursor::Show,
        event::{self, Event, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
};
use std::{
    io::{self, Stdout},
    time::Duration,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Discovers tests, then runs the explorer until the user quits.
pub(crate) fn run_interactive(
    runtime: &Runtime,
    ctx: ExplorerContext,
) -> Result<(), ExpectedError> {
    // Discovery errors are reported before the terminal is taken over.
    let session = runtime.block_on(Session::start(ctx))?;
    let mut app = App::new(session);

    let interactive_err = |err: io::Error| ExpectedError::InteractiveError { err };
    let guard = TerminalGuard::enter().map_err(interactive_err)?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(io::stdout())).map_err(interactive_err)?;

    let res = run_app(&mut terminal, &mut app);
    drop(guard);

    let in_flight = app
        .session
        .catalog()
        .entries()
        .filter(|entry| entry.run_state().is_in_flight())
        .count();
    if in_flight > 0 {
        info!("exiting with {in_flight} runs in flight; they will be killed");
    }
    res.map_err(interactive_err)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.session.sync();
        terminal.draw(|frame| render::draw(frame, app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Puts the terminal into raw mode on the alternate screen, and restores it on drop.
struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self { _private: () };
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(guard)
    }

    fn restore(stdout: &mut Stdout) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(stdout, LeaveAlternateScreen, Show)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(error) = Self::restore(&mut io::stdout()) {
            warn!("failed to restore the terminal: {error}");
        }
    }
}

#[cfg(test)]
fn test_catalog() -> gotree_runner::catalog::Catalog {
    use gotree_metadata::{TestAction, TestEventRecord};
    use gotree_runner::discovery::CatalogBuilder;

    let tests = [
        ("pkg/a", "TestOne"),
        ("pkg/a", "TestTwo"),
        ("pkg/b", "TestThree"),
    ];
    CatalogBuilder::from_events(
        "Test",
        tests.iter().map(|(package, name)| {
            Ok(TestEventRecord::new(TestAction::Output, *package).with_output(format!("{name}\n")))
        }),
    )
    .expect("listing is valid")
}

/// A session over [`test_catalog`] whose runs always fail to spawn. Must be called within a
/// tokio runtime.
#[cfg(test)]
fn test_session() -> Session {
    test_session_with(test_catalog())
}

#[cfg(test)]
fn test_session_with(catalog: gotree_runner::catalog::Catalog) -> Session {
    use gotree_runner::config::ExplorerConfig;
    use std::sync::Arc;

    let mut config = ExplorerConfig::default_config();
    config.set_program("gotree-test-program-that-does-not-exist");
    let ctx = ExplorerContext::new(".", ExplorerContext::DEFAULT_SCOPE, config);
    Session::new(
        Arc::new(ctx),
        catalog,
        tokio::runtime::Handle::current(),
    )
}
