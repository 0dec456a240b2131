//! The selection handler of a collection.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::collection::PageableCollection;
use crate::config::{CollectionConfig, SingleModeCoercion};
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::query::QueryParams;
use crate::service::ServiceHandle;

use super::{SelectMode, Selection};

/// Where the items a handler selects come from.
pub(crate) enum SelectionScope<T: Item> {
    /// Items held in memory. The closure returns the current filtered and
    /// sorted item list.
    InMemory(Arc<dyn Fn() -> Vec<T> + Send + Sync>),
    /// Items loaded from a query service.
    Query {
        service: ServiceHandle<T>,
        params: Arc<QueryParams>,
    },
    /// Items of a base collection plus transient items.
    WithAdditional {
        base: Arc<dyn PageableCollection<T>>,
        additional: Arc<RwLock<Vec<T>>>,
    },
}

/// Owns the current selection of a collection and enforces the select mode.
///
/// Every selection change is offered to the vetoable listeners of the
/// collection's notifier first; a veto leaves the selection untouched and
/// is returned as [`Error::Vetoed`].
///
/// # Select modes
///
/// - `NoSelection`: selecting is a no-op and the selection stays empty.
/// - `Single`: selecting an item replaces the selection.
/// - `Multi`: selecting an item adds to the selection.
///
/// Switching to single mode while several items are selected keeps one of
/// them, as configured by [`SingleModeCoercion`]. An inverted selection
/// cannot be reduced without loading it and becomes empty instead.
pub struct SelectionHandler<T: Item> {
    mode: RwLock<SelectMode>,
    selection: RwLock<Selection<T>>,
    scope: SelectionScope<T>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
    coercion: SingleModeCoercion,
    block_size: usize,
}

impl<T: Item> SelectionHandler<T> {
    pub(crate) fn new(
        scope: SelectionScope<T>,
        notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
        config: &CollectionConfig,
    ) -> Self {
        let handler = Self {
            mode: RwLock::new(config.default_select_mode.resolve()),
            selection: RwLock::new(Selection::empty()),
            scope,
            notifier,
            coercion: config.single_mode_coercion,
            block_size: config.block_size,
        };
        *handler.selection.write() = handler.empty_selection();
        handler
    }

    /// The current select mode. Never [`SelectMode::Default`].
    pub fn select_mode(&self) -> SelectMode {
        *self.mode.read()
    }

    /// Change the select mode, coercing the current selection to fit it.
    pub fn set_select_mode(&self, mode: SelectMode) {
        let mode = mode.resolve();
        let old = std::mem::replace(&mut *self.mode.write(), mode);
        if old == mode {
            return;
        }
        debug!(target: targets::SELECTION, ?old, new = ?mode, "select mode changed");

        let current = self.selection();
        let coerced = match mode {
            SelectMode::NoSelection if current.explicit_len() != Some(0) => {
                Some(self.empty_selection())
            }
            SelectMode::Single if current.is_inverted() => Some(self.empty_selection()),
            SelectMode::Single if current.explicit_len().unwrap_or(0) > 1 => {
                Some(match self.coercion {
                    SingleModeCoercion::KeepLast => current.last_explicit(),
                    SingleModeCoercion::KeepFirst => current.first_explicit(),
                    SingleModeCoercion::Clear => None,
                }
                .unwrap_or_else(|| self.empty_selection()))
            }
            _ => None,
        };
        if let Some(selection) = coerced {
            self.force_selection(selection);
        }
    }

    /// Number of items loaded per service call when iterating selections.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The current selection.
    pub fn selection(&self) -> Selection<T> {
        self.selection.read().clone()
    }

    /// Returns `true` if `item` is selected.
    pub fn is_selected(&self, item: &T) -> bool {
        self.selection.read().contains(item)
    }

    /// Load all selected items.
    pub fn selected_items(&self) -> Result<Vec<T>> {
        self.selection().to_vec(self.block_size)
    }

    /// Replace the selection.
    ///
    /// A no-op in `NoSelection` mode. In `Single` mode a selection of more
    /// than one item, or an inverted one, is rejected with
    /// [`Error::InvalidArgument`].
    pub fn set_selection(&self, selection: Selection<T>) -> Result<()> {
        let selection = self.fit_to_scope(selection)?;
        match self.select_mode() {
            SelectMode::NoSelection => {
                trace!(target: targets::SELECTION, "ignoring selection in no-selection mode");
                return Ok(());
            }
            SelectMode::Single
                if selection.is_inverted() || selection.explicit_len().unwrap_or(0) > 1 =>
            {
                return Err(Error::invalid_argument(
                    "single selection mode accepts at most one item",
                ));
            }
            _ => {}
        }
        self.apply(selection)
    }

    /// Select or deselect a single item.
    pub fn select(&self, item: &T, selected: bool) -> Result<()> {
        self.select_items(std::slice::from_ref(item), selected)
    }

    /// Select or deselect several items in one change.
    pub fn select_items(&self, items: &[T], selected: bool) -> Result<()> {
        let mode = self.select_mode();
        if mode == SelectMode::NoSelection {
            return Ok(());
        }
        if mode == SelectMode::Single && selected && items.len() > 1 {
            return Err(Error::invalid_argument(
                "single selection mode accepts at most one item",
            ));
        }

        let current = self.selection();
        if items.iter().all(|item| current.contains(item) == selected) {
            return Ok(());
        }

        let new = match (mode, items) {
            (SelectMode::Single, [item]) if selected => self.explicit_of(item),
            _ => items
                .iter()
                .fold(current, |sel, item| self.toggled(&sel, item, selected)),
        };
        self.apply(new)
    }

    /// Select every item, or clear the selection.
    ///
    /// Selecting everything only has an effect in `Multi` mode. For query
    /// backed collections the result is an inverted selection over the
    /// current query, so no items are loaded.
    pub fn select_all(&self, selected: bool) -> Result<()> {
        if !selected {
            if self.selection.read().explicit_len() == Some(0) {
                return Ok(());
            }
            return self.apply(self.empty_selection());
        }
        if self.select_mode() != SelectMode::Multi {
            trace!(target: targets::SELECTION, "select all needs multi selection mode");
            return Ok(());
        }
        self.apply(self.all_selection())
    }

    /// Bring the selection into a canonical state.
    ///
    /// Called after caches are cleared or the query changed. A selection
    /// that turned out to be empty becomes the canonical empty selection,
    /// and `NoSelection` mode drops whatever is selected. No veto is asked.
    pub fn ensure_selection_state_required(&self) -> Result<()> {
        let current = self.selection();
        if self.select_mode() == SelectMode::NoSelection {
            if current.explicit_len() != Some(0) {
                self.force_selection(self.empty_selection());
            }
            return Ok(());
        }
        if current.is_empty()? && !self.is_canonical_empty(&current) {
            self.force_selection(self.empty_selection());
        }
        Ok(())
    }

    /// The selected item in single mode, if exactly one item is selected.
    pub fn master_item(&self) -> Result<Option<T>> {
        if self.select_mode() != SelectMode::Single {
            return Ok(None);
        }
        let selection = self.selection();
        if selection.size()? != 1 {
            return Ok(None);
        }
        let first = selection.iter(self.block_size).next();
        first.transpose()
    }

    /// Replace the selection without asking vetoable listeners.
    pub(crate) fn force_selection(&self, selection: Selection<T>) {
        let old = std::mem::replace(&mut *self.selection.write(), selection.clone());
        debug!(target: targets::SELECTION, new = ?selection.kind(), "selection forced");
        self.notifier.notify(ChangeEvent::Selection {
            old,
            new: selection,
        });
    }

    /// Clear the selection without asking vetoable listeners.
    pub(crate) fn clear_forced(&self) {
        self.force_selection(self.empty_selection());
    }

    /// Hold the new value of `item` if it is selected by value. Membership
    /// does not change, so listeners are not involved.
    pub(crate) fn refresh_item(&self, item: &T) {
        let mut selection = self.selection.write();
        if let Some(refreshed) = selection.with_refreshed(item) {
            *selection = refreshed;
            trace!(target: targets::SELECTION, id = ?item.id(), "selected item refreshed");
        }
    }

    /// A selection of every item in scope.
    pub(crate) fn all_selection(&self) -> Selection<T> {
        match &self.scope {
            SelectionScope::InMemory(items) => Selection::of_items(items()),
            SelectionScope::Query { service, params } => {
                Selection::all_except(service.clone(), params.effective_query(), [])
            }
            SelectionScope::WithAdditional { base, additional } => Selection::with_additional(
                base.selection_handler().all_selection(),
                additional.read().clone(),
            ),
        }
    }

    /// A fresh one-item selection of the right shape for this scope.
    pub(crate) fn explicit_of(&self, item: &T) -> Selection<T> {
        match &self.scope {
            SelectionScope::InMemory(_) => Selection::of_items([item.clone()]),
            SelectionScope::Query { service, .. } => {
                Selection::of_ids(service.clone(), [service.id_of(item)])
            }
            SelectionScope::WithAdditional { base, .. } => {
                if self.is_additional(item) {
                    Selection::with_additional(Selection::empty(), [item.clone()])
                } else {
                    Selection::with_additional(base.selection_handler().explicit_of(item), [])
                }
            }
        }
    }

    /// `current` with `item` added or removed.
    pub(crate) fn toggled(&self, current: &Selection<T>, item: &T, selected: bool) -> Selection<T> {
        if let SelectionScope::WithAdditional { base, .. } = &self.scope {
            if self.is_additional(item) {
                return current.with_additional_item(item, selected);
            }
            let base_selection = base
                .selection_handler()
                .toggled(current.base(), item, selected);
            return Selection::with_additional(base_selection, current.additional_items().to_vec());
        }
        if selected && current.explicit_len() == Some(0) {
            return self.explicit_of(item);
        }
        current.with_item(item, selected)
    }

    fn apply(&self, new: Selection<T>) -> Result<()> {
        let event = ChangeEvent::Selection {
            old: self.selection(),
            new: new.clone(),
        };
        self.notifier.request(&event)?;
        let new_kind = new.kind();
        *self.selection.write() = new;
        debug!(target: targets::SELECTION, kind = new_kind, "selection changed");
        self.notifier.notify(event);
        Ok(())
    }

    fn is_composite(&self) -> bool {
        matches!(self.scope, SelectionScope::WithAdditional { .. })
    }

    fn is_additional(&self, item: &T) -> bool {
        match &self.scope {
            SelectionScope::WithAdditional { additional, .. } => {
                let id = item.id();
                additional.read().iter().any(|a| a.id() == id)
            }
            _ => false,
        }
    }

    fn empty_selection(&self) -> Selection<T> {
        if self.is_composite() {
            Selection::with_additional(Selection::empty(), [])
        } else {
            Selection::empty()
        }
    }

    fn is_canonical_empty(&self, selection: &Selection<T>) -> bool {
        selection.explicit_len() == Some(0)
            && matches!(selection.base(), Selection::Items(_))
            && matches!(selection, Selection::WithAdditional(_)) == self.is_composite()
    }

    fn fit_to_scope(&self, selection: Selection<T>) -> Result<Selection<T>> {
        match (self.is_composite(), selection) {
            (true, s @ Selection::WithAdditional(_)) => Ok(s),
            (true, s) => Ok(Selection::with_additional(s, [])),
            (false, s @ Selection::WithAdditional(_)) => Err(Error::SelectionMismatch {
                expected: "item, id or inverted id",
                found: s.kind(),
            }),
            (false, s) => Ok(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::test_support::{bean, Bean, FakeService};
    use pagewise_core::Veto;
    use parking_lot::Mutex;

    fn in_memory(config: &CollectionConfig) -> SelectionHandler<Bean> {
        let items: Vec<Bean> = (1..=5).map(|i| bean(i, "x")).collect();
        SelectionHandler::new(
            SelectionScope::InMemory(Arc::new(move || items.clone())),
            Arc::new(ChangeNotifier::new()),
            config,
        )
    }

    fn query_scoped(service: &Arc<FakeService>) -> SelectionHandler<Bean> {
        let params = Arc::new(QueryParams::new(crate::query::QueryOptions::permissive()));
        SelectionHandler::new(
            SelectionScope::Query {
                service: service.page_handle(),
                params,
            },
            Arc::new(ChangeNotifier::new()),
            &CollectionConfig::default().with_select_mode(SelectMode::Multi),
        )
    }

    fn selected_ids(handler: &SelectionHandler<Bean>) -> Vec<i64> {
        handler.selection().clicked_ids().ids
    }

    #[test]
    fn test_default_mode_is_single() {
        let handler = in_memory(&CollectionConfig::default().with_select_mode(SelectMode::Default));
        assert_eq!(handler.select_mode(), SelectMode::Single);
    }

    #[test]
    fn test_single_mode_replaces() {
        let handler = in_memory(&CollectionConfig::default());
        handler.select(&bean(1, "x"), true).unwrap();
        handler.select(&bean(2, "x"), true).unwrap();
        assert_eq!(selected_ids(&handler), vec![2]);
        assert_eq!(handler.master_item().unwrap().map(|b| b.id), Some(2));

        handler.select(&bean(2, "x"), false).unwrap();
        assert!(handler.selection().is_empty().unwrap());
        assert_eq!(handler.master_item().unwrap(), None);
    }

    #[test]
    fn test_single_mode_rejects_multi_item_selection() {
        let handler = in_memory(&CollectionConfig::default());
        let err = handler
            .set_selection(Selection::of_items([bean(1, "x"), bean(2, "x")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(handler
            .select_items(&[bean(1, "x"), bean(2, "x")], true)
            .is_err());
    }

    #[test]
    fn test_no_selection_mode_is_noop() {
        let config = CollectionConfig::default().with_select_mode(SelectMode::NoSelection);
        let handler = in_memory(&config);
        handler.select(&bean(1, "x"), true).unwrap();
        handler.set_selection(Selection::of_items([bean(1, "x")])).unwrap();
        handler.select_all(true).unwrap();
        assert!(handler.selection().is_empty().unwrap());
    }

    #[test]
    fn test_multi_mode_accumulates() {
        let handler = in_memory(&CollectionConfig::default().with_select_mode(SelectMode::Multi));
        handler.select(&bean(1, "x"), true).unwrap();
        handler.select_items(&[bean(3, "x"), bean(4, "x")], true).unwrap();
        handler.select(&bean(1, "x"), false).unwrap();
        assert_eq!(selected_ids(&handler), vec![3, 4]);
        assert_eq!(handler.master_item().unwrap(), None);
    }

    #[test]
    fn test_in_memory_select_all_is_explicit() {
        let handler = in_memory(&CollectionConfig::default().with_select_mode(SelectMode::Multi));
        handler.select_all(true).unwrap();
        assert_eq!(selected_ids(&handler), vec![1, 2, 3, 4, 5]);
        assert!(!handler.selection().is_inverted());

        handler.select_all(false).unwrap();
        assert_eq!(handler.selection().explicit_len(), Some(0));
    }

    #[test]
    fn test_select_all_requires_multi_mode() {
        let handler = in_memory(&CollectionConfig::default());
        handler.select_all(true).unwrap();
        assert!(handler.selection().is_empty().unwrap());
    }

    #[test]
    fn test_query_select_all_is_inverted() {
        let service = FakeService::with_beans(100);
        let handler = query_scoped(&service);
        handler.select_all(true).unwrap();
        handler.select(&bean(7, ""), false).unwrap();

        let selection = handler.selection();
        assert!(selection.is_inverted());
        assert!(!selection.contains(&bean(7, "")));
        assert!(selection.contains(&bean(8, "")));
        assert_eq!(selection.size().unwrap(), 99);
        assert_eq!(service.calls("fetch_page"), 0);
    }

    #[test]
    fn test_query_select_builds_id_selection() {
        let service = FakeService::with_beans(10);
        let handler = query_scoped(&service);
        handler.select(&bean(4, ""), true).unwrap();
        assert!(matches!(handler.selection(), Selection::Ids(_)));
    }

    #[test]
    fn test_coercion_to_single_keeps_last() {
        let handler = in_memory(&CollectionConfig::default().with_select_mode(SelectMode::Multi));
        handler.select_items(&[bean(2, "x"), bean(5, "x"), bean(3, "x")], true).unwrap();
        handler.set_select_mode(SelectMode::Single);
        assert_eq!(selected_ids(&handler), vec![3]);
    }

    #[test]
    fn test_coercion_to_single_keep_first_and_clear() {
        let config = CollectionConfig::default()
            .with_select_mode(SelectMode::Multi)
            .with_single_mode_coercion(SingleModeCoercion::KeepFirst);
        let handler = in_memory(&config);
        handler.select_items(&[bean(2, "x"), bean(5, "x")], true).unwrap();
        handler.set_select_mode(SelectMode::Single);
        assert_eq!(selected_ids(&handler), vec![2]);

        let handler = in_memory(&config.with_single_mode_coercion(SingleModeCoercion::Clear));
        handler.select_items(&[bean(2, "x"), bean(5, "x")], true).unwrap();
        handler.set_select_mode(SelectMode::Single);
        assert!(selected_ids(&handler).is_empty());
    }

    #[test]
    fn test_coercion_of_inverted_selection() {
        let service = FakeService::with_beans(10);
        let handler = query_scoped(&service);
        handler.select_all(true).unwrap();
        handler.set_select_mode(SelectMode::Single);
        assert_eq!(handler.selection().explicit_len(), Some(0));
    }

    #[test]
    fn test_no_selection_mode_clears() {
        let handler = in_memory(&CollectionConfig::default());
        handler.select(&bean(1, "x"), true).unwrap();
        handler.set_select_mode(SelectMode::NoSelection);
        assert!(handler.selection().is_empty().unwrap());
    }

    #[test]
    fn test_veto_keeps_selection() {
        let handler = in_memory(&CollectionConfig::default());
        handler.select(&bean(1, "x"), true).unwrap();

        handler.notifier.connect_vetoable(|e| match e {
            ChangeEvent::Selection { .. } => Err(Veto::new("row is being edited")),
            _ => Ok(()),
        });
        let err = handler.select(&bean(2, "x"), true).unwrap_err();
        assert!(err.is_veto());
        assert_eq!(selected_ids(&handler), vec![1]);
    }

    #[test]
    fn test_events_carry_old_and_new() {
        let handler = in_memory(&CollectionConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        handler.notifier.connect(move |e| {
            if let ChangeEvent::Selection { old, new } = e {
                s.lock().push((old.clicked_ids().ids, new.clicked_ids().ids));
            }
        });

        handler.select(&bean(1, "x"), true).unwrap();
        handler.select(&bean(1, "x"), true).unwrap();
        handler.select(&bean(2, "x"), true).unwrap();
        assert_eq!(*seen.lock(), vec![(vec![], vec![1]), (vec![1], vec![2])]);
    }

    #[test]
    fn test_ensure_state_normalizes_empty_inverted() {
        let service = FakeService::with_beans(3);
        let handler = query_scoped(&service);
        handler.select_all(true).unwrap();
        for id in 1..=3 {
            handler.select(&bean(id, ""), false).unwrap();
        }
        assert!(handler.selection().is_inverted());

        handler.ensure_selection_state_required().unwrap();
        assert!(matches!(handler.selection(), Selection::Items(_)));
        assert_eq!(handler.selection().explicit_len(), Some(0));
    }

    #[test]
    fn test_rejects_additional_selection_outside_composite() {
        let handler = in_memory(&CollectionConfig::default());
        let err = handler
            .set_selection(Selection::with_additional(Selection::empty(), []))
            .unwrap_err();
        assert!(matches!(err, Error::SelectionMismatch { .. }));
    }
}
