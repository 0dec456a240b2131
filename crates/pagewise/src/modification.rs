//! Added, updated and removed item bookkeeping.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::event::ChangeEvent;
use crate::item::{Item, ItemId};
use crate::logging::targets;
use crate::selection::Selection;

/// Snapshot of the modifications registered on a collection.
///
/// - An item appears in `added` at most once.
/// - An item appears in `updated` only if it is not in `added`.
/// - An item in `added` is never covered by a `removed` selection.
pub struct Modifications<T: Item> {
    added: Vec<T>,
    updated: Vec<T>,
    removed: Vec<Selection<T>>,
}

impl<T: Item> Clone for Modifications<T> {
    fn clone(&self) -> Self {
        Self {
            added: self.added.clone(),
            updated: self.updated.clone(),
            removed: self.removed.clone(),
        }
    }
}

impl<T: Item> Default for Modifications<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T: Item> std::fmt::Debug for Modifications<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = |items: &[T]| items.iter().map(|i| i.id()).collect::<Vec<_>>();
        f.debug_struct("Modifications")
            .field("added", &ids(&self.added))
            .field("updated", &ids(&self.updated))
            .field("removed", &self.removed)
            .finish()
    }
}

impl<T: Item> Modifications<T> {
    /// Items registered as added, in insertion order.
    pub fn added_items(&self) -> &[T] {
        &self.added
    }

    /// Items registered as updated.
    pub fn updated_items(&self) -> &[T] {
        &self.updated
    }

    /// Selections removed from the backing store, one per removal.
    pub fn removed_items(&self) -> &[Selection<T>] {
        &self.removed
    }

    /// Returns `true` if anything was registered.
    pub fn is_modified(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Merge the transient items of a wrapping collection into a base snapshot.
    ///
    /// A transient item that the base recorded as removed or updated is
    /// listed as added only.
    pub(crate) fn with_added(mut self, transient: &[T]) -> Self {
        for item in transient {
            let id = item.id();
            self.retract(item);
            if !self.added.iter().any(|a| a.id() == id) {
                self.added.push(item.clone());
            }
        }
        self
    }

    /// Drop `item` from the removed selections and the updated list.
    /// Removals left empty are dropped.
    fn retract(&mut self, item: &T) {
        let id = item.id();
        let removed = std::mem::take(&mut self.removed);
        self.removed = removed
            .into_iter()
            .map(|sel| if sel.contains(item) { sel.with_item(item, false) } else { sel })
            .filter(|sel| sel.explicit_len() != Some(0))
            .collect();
        self.updated.retain(|u| u.id() != id);
    }
}

/// Registers and reverts modifications of a collection.
///
/// Every mutating call offers a change event to vetoable listeners before
/// it touches anything.
pub trait ModificationHandler<T: Item>: Send + Sync {
    /// Register `item` as added. Adding an item already added replaces it.
    fn add_item(&self, item: T) -> Result<()>;

    /// Register `item` as updated, or drop that registration.
    ///
    /// Idempotent: registering the same state twice changes nothing. An
    /// item that is registered as added stays in the added list only.
    fn update_item(&self, item: &T, is_updated: bool) -> Result<()>;

    /// Remove the items of `selection` from the backing store.
    ///
    /// Returns `Ok(false)` without changing anything if a listener vetoes
    /// or if there is nothing to remove. A backing store failure is
    /// returned unchanged and leaves the collection, its caches and its
    /// selection untouched. On success the removed items are dropped from
    /// the added and updated lists, caches are cleared, the selection
    /// becomes empty and listeners are notified.
    fn remove_items(&self, selection: &Selection<T>) -> Result<bool>;

    /// Remove the currently selected items.
    fn remove_selected_items(&self) -> Result<bool>;

    /// Forget every registered modification.
    fn clear_registered_modifications(&self) -> Result<()>;

    /// The registered modifications.
    fn modifications(&self) -> Modifications<T>;
}

/// Shared bookkeeping behind every [`ModificationHandler`].
///
/// The `add`, `update` and `clear_all` operations run the whole change
/// protocol on the collection's notifier: the event is offered to vetoable
/// listeners, `apply` updates the backing items, the registration changes
/// and the event is announced.
pub(crate) struct ModificationTracker<T: Item> {
    state: RwLock<Modifications<T>>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
}

impl<T: Item> ModificationTracker<T> {
    pub(crate) fn new(notifier: Arc<ChangeNotifier<ChangeEvent<T>>>) -> Self {
        Self {
            state: RwLock::new(Modifications::default()),
            notifier,
        }
    }

    /// Register `item` as added once listeners agree and `apply` ran.
    pub(crate) fn add(&self, item: T, apply: impl FnOnce(&T)) -> Result<()> {
        let event = ChangeEvent::ItemAdded(item.clone());
        self.notifier.request(&event)?;
        apply(&item);
        self.register_added(item);
        self.notifier.notify(event);
        Ok(())
    }

    /// Register or drop an update of `item`.
    ///
    /// Listeners are only asked, and told, when the registration changes.
    /// `apply` runs either way so the new value is stored.
    pub(crate) fn update(&self, item: &T, is_updated: bool, apply: impl FnOnce(&T)) -> Result<()> {
        let id = item.id();
        let event = ChangeEvent::ItemUpdated {
            item: item.clone(),
            updated: is_updated,
        };
        if !self.is_added(&id) && self.is_updated(&id) != is_updated {
            self.notifier.request(&event)?;
        }
        apply(item);
        if self.register_updated(item, is_updated) {
            self.notifier.notify(event);
        }
        Ok(())
    }

    /// Forget every registration once listeners agree.
    pub(crate) fn clear_all(&self) -> Result<()> {
        let event = ChangeEvent::ModificationsCleared;
        self.notifier.request(&event)?;
        self.clear();
        self.notifier.notify(event);
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Modifications<T> {
        self.state.read().clone()
    }

    pub(crate) fn is_added(&self, id: &ItemId<T>) -> bool {
        self.state.read().added.iter().any(|a| a.id() == *id)
    }

    pub(crate) fn is_updated(&self, id: &ItemId<T>) -> bool {
        self.state.read().updated.iter().any(|u| u.id() == *id)
    }

    pub(crate) fn register_added(&self, item: T) {
        let id = item.id();
        let mut state = self.state.write();
        // A re-added item is no longer removed.
        state.retract(&item);
        match state.added.iter_mut().find(|a| a.id() == id) {
            Some(existing) => *existing = item,
            None => state.added.push(item),
        }
        debug!(target: targets::MODIFICATION, ?id, "item registered as added");
    }

    /// Returns `true` if the registration changed.
    pub(crate) fn register_updated(&self, item: &T, is_updated: bool) -> bool {
        let id = item.id();
        let mut state = self.state.write();
        if let Some(added) = state.added.iter_mut().find(|a| a.id() == id) {
            *added = item.clone();
            return false;
        }
        let position = state.updated.iter().position(|u| u.id() == id);
        let changed = match (position, is_updated) {
            (Some(pos), true) => {
                state.updated[pos] = item.clone();
                false
            }
            (None, true) => {
                state.updated.push(item.clone());
                true
            }
            (Some(pos), false) => {
                state.updated.remove(pos);
                true
            }
            (None, false) => false,
        };
        if changed {
            debug!(target: targets::MODIFICATION, ?id, is_updated, "update registration changed");
        }
        changed
    }

    /// Record a successful removal.
    ///
    /// Added items covered by the removal are dropped and not recorded as
    /// removed. Updated items covered by it are dropped too.
    pub(crate) fn register_removed(&self, selection: &Selection<T>) {
        let mut state = self.state.write();
        let mut recorded = selection.base().clone();
        let mut purged = 0usize;
        let added = std::mem::take(&mut state.added);
        for item in added {
            if selection.contains(&item) {
                if recorded.contains(&item) {
                    recorded = recorded.with_item(&item, false);
                }
                purged += 1;
            } else {
                state.added.push(item);
            }
        }
        state.updated.retain(|u| !selection.contains(u));
        if !matches!(recorded.explicit_len(), Some(0)) {
            state.removed.push(recorded);
        }
        debug!(
            target: targets::MODIFICATION,
            purged_added = purged,
            "removal registered"
        );
    }

    pub(crate) fn clear(&self) {
        *self.state.write() = Modifications::default();
        debug!(target: targets::MODIFICATION, "modifications cleared");
    }
}
