// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use gotree_runner::catalog::{Catalog, NodeId};

/// Expansion and cursor state for the package → test tree.
///
/// The catalog's structure never changes after discovery, so this only has to track which
/// packages are expanded and which row the cursor is on.
#[derive(Clone, Debug)]
pub(super) struct TreeView {
    expanded: Vec<bool>,
    cursor: usize,
}

impl TreeView {
    pub(super) fn new(catalog: &Catalog) -> Self {
        Self {
            expanded: vec![true; catalog.packages().len()],
            cursor: 0,
        }
    }

    /// Returns the rows currently shown, top to bottom.
    pub(super) fn visible_rows(&self, catalog: &Catalog) -> Vec<NodeId> {
        let mut rows = Vec::with_capacity(catalog.packages().len() + catalog.test_count());
        for package in catalog.packages() {
            rows.push(NodeId::Package(package.index()));
            if self.is_expanded(package.index()) {
                rows.extend(package.entries().iter().map(|entry| NodeId::Entry(entry.id())));
            }
        }
        rows
    }

    pub(super) fn is_expanded(&self, package: usize) -> bool {
        self.expanded.get(package).copied().unwrap_or(false)
    }

    /// The index of the cursor within [`Self::visible_rows`].
    pub(super) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(super) fn cursor_node(&self, catalog: &Catalog) -> Option<NodeId> {
        self.visible_rows(catalog).get(self.cursor).copied()
    }

    pub(super) fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub(super) fn move_down(&mut self, catalog: &Catalog) {
        let rows = self.visible_rows(catalog).len();
        if self.cursor + 1 < rows {
            self.cursor += 1;
        }
    }

    /// Expands or collapses a package. The cursor stays on the same node, or moves to the
    /// package row if its entry was hidden.
    pub(super) fn toggle_expanded(&mut self, catalog: &Catalog, package: usize) {
        let current = self.cursor_node(catalog);
        let Some(expanded) = self.expanded.get_mut(package) else {
            return;
        };
        *expanded = !*expanded;

        let rows = self.visible_rows(catalog);
        let target = match current {
            Some(NodeId::Entry(id)) if id.package == package && !self.is_expanded(package) => {
                Some(NodeId::Package(package))
            }
            other => other,
        };
        self.cursor = target
            .and_then(|node| rows.iter().position(|row| *row == node))
            .unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_catalog as catalog;
    use gotree_runner::catalog::EntryId;
    use pretty_assertions::assert_eq;

    fn entry(package: usize, index: usize) -> NodeId {
        NodeId::Entry(EntryId { package, index })
    }

    #[test]
    fn all_packages_start_expanded() {
        let catalog = catalog();
        let tree = TreeView::new(&catalog);
        assert_eq!(
            tree.visible_rows(&catalog),
            vec![
                NodeId::Package(0),
                entry(0, 0),
                entry(0, 1),
                NodeId::Package(1),
                entry(1, 0),
            ]
        );
        assert_eq!(tree.cursor_node(&catalog), Some(NodeId::Package(0)));
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let catalog = catalog();
        let mut tree = TreeView::new(&catalog);
        tree.move_up();
        assert_eq!(tree.cursor(), 0);
        for _ in 0..10 {
            tree.move_down(&catalog);
        }
        assert_eq!(tree.cursor_node(&catalog), Some(entry(1, 0)));
    }

    #[test]
    fn collapsing_moves_cursor_to_package() {
        let catalog = catalog();
        let mut tree = TreeView::new(&catalog);
        tree.move_down(&catalog);
        tree.move_down(&catalog);
        assert_eq!(tree.cursor_node(&catalog), Some(entry(0, 1)));

        tree.toggle_expanded(&catalog, 0);
        assert!(!tree.is_expanded(0));
        assert_eq!(
            tree.visible_rows(&catalog),
            vec![NodeId::Package(0), NodeId::Package(1), entry(1, 0)]
        );
        assert_eq!(tree.cursor_node(&catalog), Some(NodeId::Package(0)));
    }

    #[test]
    fn collapsing_another_package_keeps_cursor_node() {
        let catalog = catalog();
        let mut tree = TreeView::new(&catalog);
        for _ in 0..4 {
            tree.move_down(&catalog);
        }
        assert_eq!(tree.cursor_node(&catalog), Some(entry(1, 0)));

        tree.toggle_expanded(&catalog, 0);
        assert_eq!(tree.cursor_node(&catalog), Some(entry(1, 0)));
        assert_eq!(tree.cursor(), 2);

        tree.toggle_expanded(&catalog, 0);
        assert_eq!(tree.cursor(), 4);
    }

    #[test]
    fn unknown_package_is_ignored() {
        let catalog = catalog();
        let mut tree = TreeView::new(&catalog);
        tree.toggle_expanded(&catalog, 7);
        assert_eq!(tree.visible_rows(&catalog).len(), 5);
    }
}
