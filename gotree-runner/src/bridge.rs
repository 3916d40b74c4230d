// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bridge between background work and the presentation thread.
//!
//! Background units of work (discovery, test runs) never touch the [`Catalog`] directly. Instead
//! they [`schedule`](UiBridge::schedule) an [`EntryUpdate`], which is queued until the
//! presentation thread drains the [`BridgeReceiver`] between render passes. Since the receiver is
//! the only place updates are applied, no two updates ever run concurrently with each other or
//! with rendering.
//!
//! Updates submitted through the same [`UiBridge`] handle are applied in submission order.

use crate::catalog::{ApplyOutcome, Catalog, EntryId, RunId, RunState};
use tokio::sync::mpsc::{
    UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel,
};
use tracing::trace;

/// Creates a new bridge, returning the sending and receiving halves.
pub fn ui_bridge() -> (UiBridge, BridgeReceiver) {
    let (tx, rx) = unbounded_channel();
    (UiBridge { tx }, BridgeReceiver { rx })
}

/// A state change for a single entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryUpdate {
    /// The entry to change.
    pub entry: EntryId,

    /// The change to make.
    pub kind: EntryUpdateKind,
}

/// The kinds of change that can be made to an entry from outside the presentation thread.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntryUpdateKind {
    /// Marks or unmarks the entry for execution.
    SetSelected(bool),

    /// Starts a new run record: clears captured output and sets the state to
    /// [`RunState::Queued`] in a single step.
    Queued {
        /// The run being queued.
        run: RunId,
    },

    /// The run's subprocess is about to start.
    Running {
        /// The run this update belongs to.
        run: RunId,
    },

    /// An output fragment attributed to the entry.
    Output {
        /// The run this update belongs to.
        run: RunId,

        /// The fragment, appended verbatim.
        fragment: String,
    },

    /// The run reached a terminal state.
    Finished {
        /// The run this update belongs to.
        run: RunId,

        /// The terminal state.
        state: RunState,
    },
}

/// The sending half of the bridge. Cheap to clone; one clone per unit of work.
#[derive(Clone, Debug)]
pub struct UiBridge {
    tx: UnboundedSender<EntryUpdate>,
}

impl UiBridge {
    /// Schedules an update to be applied on the presentation thread.
    ///
    /// If the presentation thread has gone away the update is dropped: there is nothing left to
    /// show it to.
    pub fn schedule(&self, update: EntryUpdate) {
        if self.tx.send(update).is_err() {
            trace!("bridge receiver dropped, discarding update");
        }
    }

    /// Shorthand for scheduling an update of the given kind for `entry`.
    pub fn schedule_for(&self, entry: EntryId, kind: EntryUpdateKind) {
        self.schedule(EntryUpdate { entry, kind });
    }
}

/// The receiving half of the bridge, owned by the presentation thread.
#[derive(Debug)]
pub struct BridgeReceiver {
    rx: UnboundedReceiver<EntryUpdate>,
}

impl BridgeReceiver {
    /// Applies every update that is currently pending, without blocking.
    ///
    /// Returns the number of updates that changed the catalog.
    pub fn drain(&mut self, catalog: &mut Catalog) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(update) => {
                    if catalog.apply(update) == ApplyOutcome::Applied {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Waits for the next update and applies it, returning the update's target and outcome.
    ///
    /// Returns `None` once every [`UiBridge`] handle has been dropped and no updates remain.
    pub async fn recv_apply(&mut self, catalog: &mut Catalog) -> Option<(EntryId, ApplyOutcome)> {
        let update = self.rx.recv().await?;
        let entry = update.entry;
        Some((entry, catalog.apply(update)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PassKind;
    use pretty_assertions::assert_eq;

    fn catalog() -> (Catalog, EntryId, EntryId) {
        let mut catalog = Catalog::default();
        let foo = catalog.push_entry("pkg/a", "TestFoo").expect("new entry");
        let bar = catalog.push_entry("pkg/b", "TestBar").expect("new entry");
        (catalog, foo, bar)
    }

    #[test]
    fn drain_applies_in_submission_order() {
        let (mut catalog, foo, _) = catalog();
        let (bridge, mut receiver) = ui_bridge();
        let run = RunId(7);

        bridge.schedule_for(foo, EntryUpdateKind::Queued { run });
        bridge.schedule_for(foo, EntryUpdateKind::Running { run });
        for fragment in ["a", "b", "c"] {
            bridge.schedule_for(
                foo,
                EntryUpdateKind::Output {
                    run,
                    fragment: fragment.to_owned(),
                },
            );
        }
        bridge.schedule_for(
            foo,
            EntryUpdateKind::Finished {
                run,
                state: RunState::Passed(PassKind::Ok),
            },
        );

        assert_eq!(catalog.entry(foo).unwrap().run_state(), &RunState::Unstarted);
        assert_eq!(receiver.drain(&mut catalog), 6);
        let entry = catalog.entry(foo).unwrap();
        assert_eq!(entry.captured_output(), "abc");
        assert_eq!(entry.run_state(), &RunState::Passed(PassKind::Ok));
        assert_eq!(receiver.drain(&mut catalog), 0, "queue is empty");
    }

    #[test]
    fn updates_from_many_threads() {
        let (mut catalog, foo, bar) = catalog();
        let (bridge, mut receiver) = ui_bridge();

        let handles: Vec<_> = [(foo, RunId(1)), (bar, RunId(2))]
            .into_iter()
            .map(|(entry, run)| {
                let bridge = bridge.clone();
                std::thread::spawn(move || {
                    bridge.schedule_for(entry, EntryUpdateKind::Queued { run });
                    for i in 0..100 {
                        bridge.schedule_for(
                            entry,
                            EntryUpdateKind::Output {
                                run,
                                fragment: format!("{i},"),
                            },
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread finished");
        }
        drop(bridge);

        receiver.drain(&mut catalog);
        let expected: String = (0..100).map(|i| format!("{i},")).collect();
        assert_eq!(catalog.entry(foo).unwrap().captured_output(), expected);
        assert_eq!(catalog.entry(bar).unwrap().captured_output(), expected);
        assert_eq!(receiver.drain(&mut catalog), 0, "senders are gone");
    }

    #[tokio::test]
    async fn recv_apply_ends_when_senders_drop() {
        let (mut catalog, foo, _) = catalog();
        let (bridge, mut receiver) = ui_bridge();
        bridge.schedule_for(foo, EntryUpdateKind::SetSelected(true));
        drop(bridge);

        assert_eq!(
            receiver.recv_apply(&mut catalog).await,
            Some((foo, ApplyOutcome::Applied))
        );
        assert!(catalog.entry(foo).unwrap().is_selected());
        assert_eq!(receiver.recv_apply(&mut catalog).await, None);
    }

    #[test]
    fn schedule_after_receiver_dropped() {
        let (_, foo, _) = catalog();
        let (bridge, receiver) = ui_bridge();
        drop(receiver);
        // Must not panic.
        bridge.schedule_for(foo, EntryUpdateKind::SetSelected(true));
    }
}
