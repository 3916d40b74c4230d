// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::tree::TreeView;
use gotree_runner::{
    catalog::{NodeId, NodeRef},
    session::{ActivateOutcome, Session},
};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

/// State for the interactive explorer.
#[derive(Debug)]
pub(super) struct App {
    pub(super) session: Session,
    pub(super) tree: TreeView,
    pub(super) show_output: bool,
    pub(super) status: String,
    pub(super) should_quit: bool,
}

impl App {
    pub(super) fn new(session: Session) -> Self {
        let tree = TreeView::new(session.catalog());
        let status = format!(
            "discovered {} tests across {} packages",
            session.catalog().test_count(),
            session.catalog().packages().len(),
        );
        Self {
            session,
            tree,
            show_output: true,
            status,
            should_quit: false,
        }
    }

    pub(super) fn cursor_node(&self) -> Option<NodeId> {
        self.tree.cursor_node(self.session.catalog())
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.tree.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.tree.move_down(self.session.catalog()),
            KeyCode::Enter => self.activate(),
            KeyCode::Char(' ') => self.toggle_select(),
            KeyCode::Char('a') => {
                self.session.selection().select_everything();
                self.status = format!("selected {} tests", self.session.selection().count());
            }
            KeyCode::Char('c') => {
                self.session.selection().clear();
                self.status = "selection cleared".to_owned();
            }
            KeyCode::Char('r') => self.run_selected(),
            KeyCode::Tab => self.show_output = !self.show_output,
            _ => {}
        }
    }

    fn activate(&mut self) {
        let Some(node) = self.cursor_node() else {
            return;
        };
        match self.session.on_activate(node) {
            ActivateOutcome::ToggleExpanded(package) => {
                self.tree.toggle_expanded(self.session.catalog(), package);
            }
            ActivateOutcome::Dispatched(_) => {
                if let Some(NodeRef::Entry(entry)) = self.session.catalog().node(node) {
                    self.status = format!("running {}", entry.name());
                }
            }
            ActivateOutcome::Ignored => debug!(?node, "activated a node that doesn't exist"),
        }
    }

    fn toggle_select(&mut self) {
        let Some(node) = self.cursor_node() else {
            return;
        };
        if self.session.on_toggle_select(node).is_some() {
            self.status = format!("{} selected", self.session.selection().count());
        }
    }

    fn run_selected(&mut self) {
        self.status = match self.session.on_run_requested() {
            Some(handle) => format!("running {} selected tests", handle.queued()),
            None => "nothing selected (space to select, a for all)".to_owned(),
        };
    }
}
