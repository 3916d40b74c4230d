// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The explorer session: explicit context plus the callbacks the presentation layer invokes.

use crate::{
    bridge::{BridgeReceiver, ui_bridge},
    catalog::{ApplyOutcome, Catalog, EntryId, NodeId},
    config::ExplorerConfig,
    discovery::discover,
    errors::DiscoveryError,
    runner::{DispatchHandle, RunDispatcher},
    selection::SelectionSet,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Context shared by every component of a session.
///
/// Constructed once at startup and passed explicitly wherever the root directory, scope or
/// configuration is needed.
#[derive(Clone, Debug)]
pub struct ExplorerContext {
    root_dir: Utf8PathBuf,
    scope: String,
    config: ExplorerConfig,
}

impl ExplorerContext {
    /// The scope used when none is specified: every package under the root.
    pub const DEFAULT_SCOPE: &'static str = "./...";

    /// Creates a new context.
    pub fn new(
        root_dir: impl Into<Utf8PathBuf>,
        scope: impl Into<String>,
        config: ExplorerConfig,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            scope: scope.into(),
            config,
        }
    }

    /// Returns the directory `go test` is run in.
    pub fn root_dir(&self) -> &Utf8Path {
        &self.root_dir
    }

    /// Returns the scope selector passed to discovery.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }
}

/// What happened in response to [`Session::on_activate`].
#[derive(Debug)]
pub enum ActivateOutcome {
    /// A package node was activated; the presentation layer should expand or collapse it.
    ToggleExpanded(usize),

    /// A test entry was activated and dispatched on its own.
    Dispatched(DispatchHandle),

    /// The node doesn't exist.
    Ignored,
}

/// A running explorer session.
///
/// The session is owned by the presentation thread. It is the only owner of the catalog, which
/// background work updates by way of the bridge; [`Session::sync`] applies those updates.
#[derive(Debug)]
pub struct Session {
    catalog: Catalog,
    dispatcher: RunDispatcher,
    receiver: BridgeReceiver,
}

impl Session {
    /// Runs discovery and creates a session over the resulting catalog.
    ///
    /// This blocks startup until discovery completes, since there's nothing to show without a
    /// catalog.
    pub async fn start(ctx: ExplorerContext) -> Result<Self, DiscoveryError> {
        let catalog = discover(&ctx).await?;
        Ok(Self::new(Arc::new(ctx), catalog, Handle::current()))
    }

    /// Creates a session over an already-discovered catalog.
    pub fn new(ctx: Arc<ExplorerContext>, catalog: Catalog, handle: Handle) -> Self {
        let (bridge, receiver) = ui_bridge();
        Self {
            catalog,
            dispatcher: RunDispatcher::new(ctx, bridge, handle),
            receiver,
        }
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns a mutable view of the selection.
    pub fn selection(&mut self) -> SelectionSet<'_> {
        SelectionSet::new(&mut self.catalog)
    }

    /// The user pressed the primary action key on a node.
    pub fn on_activate(&mut self, node: NodeId) -> ActivateOutcome {
        match node {
            NodeId::Package(index) if index < self.catalog.packages().len() => {
                ActivateOutcome::ToggleExpanded(index)
            }
            NodeId::Entry(id) if self.catalog.entry(id).is_some() => {
                ActivateOutcome::Dispatched(self.dispatcher.run_entries(&self.catalog, [id]))
            }
            _ => ActivateOutcome::Ignored,
        }
    }

    /// The user marked or unmarked a node.
    ///
    /// For a package, every entry in it is toggled as a unit. Returns the new selection state, or
    /// `None` if the node doesn't exist.
    pub fn on_toggle_select(&mut self, node: NodeId) -> Option<bool> {
        let mut selection = self.selection();
        match node {
            NodeId::Package(index) => selection.toggle_package(index),
            NodeId::Entry(id) => selection.toggle(id),
        }
    }

    /// The user asked to run the current selection.
    ///
    /// Returns `None` if nothing is selected.
    pub fn on_run_requested(&mut self) -> Option<DispatchHandle> {
        if self.selection().count() == 0 {
            debug!("run requested with an empty selection");
            return None;
        }
        Some(self.dispatcher.run_selected(&self.catalog))
    }

    /// Applies every pending update from background work. Call this between render passes.
    ///
    /// Returns the number of updates applied.
    pub fn sync(&mut self) -> usize {
        self.receiver.drain(&mut self.catalog)
    }

    /// Waits for the next update from background work and applies it.
    ///
    /// Returns the entry the update was for and how it was applied, or `None` once no more
    /// updates can arrive.
    pub async fn sync_next(&mut self) -> Option<(EntryId, ApplyOutcome)> {
        self.receiver.recv_apply(&mut self.catalog).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FailureReason, RunState};
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        let mut catalog = Catalog::default();
        catalog.push_entry("pkg/a", "TestFoo");
        catalog.push_entry("pkg/a", "TestBar");
        catalog.push_entry("pkg/b", "TestBaz");

        let mut config = ExplorerConfig::default_config();
        config.set_program("gotree-definitely-not-a-real-program");
        let ctx = ExplorerContext::new(".", ExplorerContext::DEFAULT_SCOPE, config);
        Session::new(Arc::new(ctx), catalog, Handle::current())
    }

    const FOO: EntryId = EntryId {
        package: 0,
        index: 0,
    };

    #[tokio::test]
    async fn toggle_select_entries_and_packages() {
        let mut session = session();
        assert_eq!(session.on_toggle_select(NodeId::Entry(FOO)), Some(true));
        assert_eq!(session.on_toggle_select(NodeId::Package(0)), Some(true));
        assert_eq!(session.selection().count(), 2);
        assert_eq!(session.on_toggle_select(NodeId::Package(0)), Some(false));
        assert_eq!(session.selection().count(), 0);
        assert_eq!(session.on_toggle_select(NodeId::Package(4)), None);
    }

    #[tokio::test]
    async fn run_requested_with_empty_selection() {
        let mut session = session();
        assert!(session.on_run_requested().is_none());
        assert_eq!(session.sync(), 0);
    }

    #[tokio::test]
    async fn activate_package_and_entry() {
        let mut session = session();
        assert!(matches!(
            session.on_activate(NodeId::Package(1)),
            ActivateOutcome::ToggleExpanded(1)
        ));
        assert!(matches!(
            session.on_activate(NodeId::Package(2)),
            ActivateOutcome::Ignored
        ));

        let ActivateOutcome::Dispatched(handle) = session.on_activate(NodeId::Entry(FOO)) else {
            panic!("activating an entry dispatches it");
        };
        assert_eq!(handle.queued(), 1);
        handle.wait().await;
        session.sync();

        let foo = session.catalog().entry(FOO).unwrap();
        assert!(
            matches!(
                foo.run_state(),
                RunState::Failed(FailureReason::SpawnFailed(_))
            ),
            "unexpected state {}",
            foo.run_state()
        );
        assert!(!foo.is_selected(), "activation doesn't change the selection");

        let bar = session.catalog().find("pkg/a", "TestBar").unwrap();
        assert_eq!(bar.run_state(), &RunState::Unstarted);
    }

    #[tokio::test]
    async fn run_requested_dispatches_selection() {
        let mut session = session();
        session.selection().select_matching("Ba");
        let handle = session.on_run_requested().expect("two tests are selected");
        assert_eq!(handle.queued(), 2);

        let summary = handle.wait().await;
        assert_eq!(summary.failed, 2);
        session.sync();
        let states: Vec<_> = session
            .catalog()
            .entries()
            .map(|entry| entry.run_state().name())
            .collect();
        assert_eq!(states, vec!["unstarted", "spawn-failed", "spawn-failed"]);
    }
}
