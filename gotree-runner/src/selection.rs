// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The set of entries marked for execution.
//!
//! The selection is stored as a flag on each [`TestEntry`](crate::catalog::TestEntry); a
//! [`SelectionSet`] is a mutable view over those flags. All operations are synchronous and
//! infallible, and are meant to be called on the presentation thread. Only individual entries are
//! selectable: package-level selection is expressed as a toggle per entry.

use crate::catalog::{Catalog, EntryId};

/// A mutable view over the selection flags of a [`Catalog`].
#[derive(Debug)]
pub struct SelectionSet<'a> {
    catalog: &'a mut Catalog,
}

impl<'a> SelectionSet<'a> {
    /// Creates a view over the given catalog.
    pub fn new(catalog: &'a mut Catalog) -> Self {
        Self { catalog }
    }

    /// Flips the selection flag of an entry, returning the new value.
    ///
    /// Returns `None` if the entry doesn't exist.
    pub fn toggle(&mut self, id: EntryId) -> Option<bool> {
        let entry = self.catalog.entry_mut(id)?;
        let selected = !entry.is_selected();
        entry.set_selected(selected);
        Some(selected)
    }

    /// Sets the selection flag of an entry. Returns false if the entry doesn't exist.
    pub fn set(&mut self, id: EntryId, selected: bool) -> bool {
        match self.catalog.entry_mut(id) {
            Some(entry) => {
                entry.set_selected(selected);
                true
            }
            None => false,
        }
    }

    /// Selects every entry in `ids`.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = EntryId>) {
        for id in ids {
            self.set(id, true);
        }
    }

    /// Selects every entry in the catalog.
    pub fn select_everything(&mut self) {
        let ids = all_ids(self.catalog);
        self.select_all(ids);
    }

    /// Deselects every entry.
    pub fn clear(&mut self) {
        for id in all_ids(self.catalog) {
            self.set(id, false);
        }
    }

    /// Toggles all entries in a package as a unit: if any entry is unselected, every entry
    /// becomes selected, otherwise every entry becomes unselected.
    ///
    /// This is a convenience built from per-entry toggles. Returns the new state, or `None` if
    /// the package doesn't exist or has no entries.
    pub fn toggle_package(&mut self, package: usize) -> Option<bool> {
        let group = self.catalog.packages().get(package)?;
        if group.entries().is_empty() {
            return None;
        }
        let target = group.entries().iter().any(|entry| !entry.is_selected());
        let to_flip: Vec<_> = group
            .entries()
            .iter()
            .filter(|entry| entry.is_selected() != target)
            .map(|entry| entry.id())
            .collect();
        for id in to_flip {
            self.toggle(id);
        }
        Some(target)
    }

    /// Selects entries whose name contains `pattern`, returning how many matched.
    pub fn select_matching(&mut self, pattern: &str) -> usize {
        let ids: Vec<_> = self
            .catalog
            .entries()
            .filter(|entry| entry.name().contains(pattern))
            .map(|entry| entry.id())
            .collect();
        let count = ids.len();
        self.select_all(ids);
        count
    }

    /// Returns the selected entries, in catalog order.
    pub fn selected_ids(&self) -> Vec<EntryId> {
        selected_ids(self.catalog)
    }

    /// Returns the number of selected entries.
    pub fn count(&self) -> usize {
        self.catalog.entries().filter(|e| e.is_selected()).count()
    }
}

/// Returns the selected entries of a catalog, in catalog order.
pub fn selected_ids(catalog: &Catalog) -> Vec<EntryId> {
    catalog
        .entries()
        .filter(|entry| entry.is_selected())
        .map(|entry| entry.id())
        .collect()
}

fn all_ids(catalog: &Catalog) -> Vec<EntryId> {
    catalog.entries().map(|entry| entry.id()).collect()
}
