//! Selections and selection handling.
//!
//! A [`Selection`] is an immutable value describing a set of selected
//! items. Changing what is selected means replacing the selection held by a
//! [`SelectionHandler`], which offers the change to vetoable listeners
//! first.
//!
//! Selections come in four shapes:
//!
//! - **Items**: an explicit list of item values, used by in-memory collections.
//! - **Ids**: an explicit list of identifiers, resolved through a query service.
//! - **All except**: everything matching a query except a list of identifiers.
//!   Produced by "select all" on query backed collections, so selecting
//!   a million rows costs nothing until the selection is iterated.
//! - **With additional items**: a base selection plus selected transient items.

mod handler;
mod iter;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::item::{Item, ItemId};
use crate::query::EffectiveQuery;
use crate::service::ServiceHandle;

pub use handler::SelectionHandler;
pub(crate) use handler::SelectionScope;
pub use iter::SelectionIter;

/// Selection mode of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    /// Resolves to [`SelectMode::Single`].
    #[default]
    Default,
    /// Selecting has no effect.
    NoSelection,
    /// At most one item is selected.
    Single,
    /// Any number of items may be selected.
    Multi,
}

impl SelectMode {
    /// Resolve [`SelectMode::Default`] to the concrete mode.
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Single,
            other => other,
        }
    }
}

/// The identifiers a selection was built from.
///
/// If `inverted` is set, the selection contains every item of its query
/// except the listed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickedIds<Id> {
    pub ids: Vec<Id>,
    pub inverted: bool,
}

impl<Id> ClickedIds<Id> {
    /// Returns `true` if the ids are the unselected items.
    pub fn is_selection_with_inverted_ids(&self) -> bool {
        self.inverted
    }
}

/// Identifiers in selection order, with a set for membership tests.
pub(crate) struct IdList<Id> {
    pub(crate) order: Vec<Id>,
    pub(crate) set: HashSet<Id>,
}

impl<Id: Clone + Eq + std::hash::Hash> IdList<Id> {
    fn new(ids: impl IntoIterator<Item = Id>) -> Self {
        let mut list = Self {
            order: Vec::new(),
            set: HashSet::new(),
        };
        for id in ids {
            list.push(id);
        }
        list
    }

    fn push(&mut self, id: Id) {
        if self.set.insert(id.clone()) {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &Id) {
        if self.set.remove(id) {
            self.order.retain(|i| i != id);
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// An explicit list of selected item values.
pub struct ItemSelection<T: Item> {
    items: Arc<Vec<T>>,
    ids: Arc<IdList<ItemId<T>>>,
}

/// An explicit list of selected identifiers, resolved through a service.
pub struct IdSelection<T: Item> {
    ids: Arc<IdList<ItemId<T>>>,
    service: ServiceHandle<T>,
}

/// Everything matching a query, except some identifiers.
pub struct InvertedSelection<T: Item> {
    excluded: Arc<IdList<ItemId<T>>>,
    service: ServiceHandle<T>,
    query: EffectiveQuery,
}

/// A base selection plus selected transient items.
pub struct AdditionalSelection<T: Item> {
    base: Box<Selection<T>>,
    additional: ItemSelection<T>,
}

/// An immutable set of selected items.
///
/// Cloning is cheap; the id lists are shared.
pub enum Selection<T: Item> {
    Items(ItemSelection<T>),
    Ids(IdSelection<T>),
    AllExcept(InvertedSelection<T>),
    WithAdditional(AdditionalSelection<T>),
}

impl<T: Item> ItemSelection<T> {
    fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut list = Vec::new();
        let mut ids = IdList::new([]);
        for item in items {
            let id = item.id();
            if !ids.set.contains(&id) {
                ids.push(id);
                list.push(item);
            }
        }
        Self {
            items: Arc::new(list),
            ids: Arc::new(ids),
        }
    }

    /// The selected items in selection order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn contains_id(&self, id: &ItemId<T>) -> bool {
        self.ids.set.contains(id)
    }

    fn with(&self, item: &T, selected: bool) -> Self {
        let id = item.id();
        let mut items: Vec<T> = self.items.iter().filter(|i| i.id() != id).cloned().collect();
        if selected {
            items.push(item.clone());
        }
        Self::new(items)
    }

    /// A copy holding `item` in place of the selected item with its id.
    fn replaced(&self, item: &T) -> Option<Self> {
        let id = item.id();
        if !self.contains_id(&id) {
            return None;
        }
        let items = self
            .items
            .iter()
            .map(|i| if i.id() == id { item.clone() } else { i.clone() })
            .collect();
        Some(Self {
            items: Arc::new(items),
            ids: self.ids.clone(),
        })
    }
}

impl<T: Item> Clone for ItemSelection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl<T: Item> IdSelection<T> {
    /// The selected identifiers in selection order.
    pub fn ids(&self) -> &[ItemId<T>] {
        &self.ids.order
    }

    /// The service resolving the identifiers.
    pub fn service(&self) -> &ServiceHandle<T> {
        &self.service
    }
}

impl<T: Item> Clone for IdSelection<T> {
    fn clone(&self) -> Self {
        Self {
            ids: self.ids.clone(),
            service: self.service.clone(),
        }
    }
}

impl<T: Item> InvertedSelection<T> {
    /// The identifiers excluded from the selection.
    pub fn excluded_ids(&self) -> &[ItemId<T>] {
        &self.excluded.order
    }

    /// The query whose result set is selected.
    pub fn query(&self) -> &EffectiveQuery {
        &self.query
    }

    /// The service executing the query.
    pub fn service(&self) -> &ServiceHandle<T> {
        &self.service
    }
}

impl<T: Item> Clone for InvertedSelection<T> {
    fn clone(&self) -> Self {
        Self {
            excluded: self.excluded.clone(),
            service: self.service.clone(),
            query: self.query.clone(),
        }
    }
}

impl<T: Item> AdditionalSelection<T> {
    /// The selection of backing store items.
    pub fn base(&self) -> &Selection<T> {
        &self.base
    }

    /// The selected transient items.
    pub fn additional_items(&self) -> &[T] {
        self.additional.items()
    }
}

impl<T: Item> Clone for AdditionalSelection<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            additional: self.additional.clone(),
        }
    }
}

impl<T: Item> Clone for Selection<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Items(s) => Self::Items(s.clone()),
            Self::Ids(s) => Self::Ids(s.clone()),
            Self::AllExcept(s) => Self::AllExcept(s.clone()),
            Self::WithAdditional(s) => Self::WithAdditional(s.clone()),
        }
    }
}

impl<T: Item> Default for Selection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Item> Selection<T> {
    /// The canonical empty selection.
    pub fn empty() -> Self {
        Self::Items(ItemSelection::new([]))
    }

    /// An explicit selection of item values. Duplicate ids are dropped.
    pub fn of_items(items: impl IntoIterator<Item = T>) -> Self {
        Self::Items(ItemSelection::new(items))
    }

    /// An explicit selection of identifiers resolved through `service`.
    pub fn of_ids(service: ServiceHandle<T>, ids: impl IntoIterator<Item = ItemId<T>>) -> Self {
        Self::Ids(IdSelection {
            ids: Arc::new(IdList::new(ids)),
            service,
        })
    }

    /// Every item matching `query` except `excluded`.
    pub fn all_except(
        service: ServiceHandle<T>,
        query: EffectiveQuery,
        excluded: impl IntoIterator<Item = ItemId<T>>,
    ) -> Self {
        Self::AllExcept(InvertedSelection {
            excluded: Arc::new(IdList::new(excluded)),
            service,
            query,
        })
    }

    /// A base selection plus selected transient items.
    ///
    /// A nested additional-items selection as base is flattened; its
    /// additional items come first.
    pub fn with_additional(base: Selection<T>, additional: impl IntoIterator<Item = T>) -> Self {
        let (base, nested) = match base {
            Self::WithAdditional(inner) => (*inner.base, inner.additional.items.as_ref().clone()),
            other => (other, Vec::new()),
        };
        Self::WithAdditional(AdditionalSelection {
            base: Box::new(base),
            additional: ItemSelection::new(nested.into_iter().chain(additional)),
        })
    }

    /// Short name of the selection shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Items(_) => "item",
            Self::Ids(_) => "id",
            Self::AllExcept(_) => "inverted id",
            Self::WithAdditional(_) => "additional item",
        }
    }

    /// Returns `true` for the inverted shape, including as base of an
    /// additional-items selection.
    pub fn is_inverted(&self) -> bool {
        match self {
            Self::AllExcept(_) => true,
            Self::WithAdditional(s) => s.base.is_inverted(),
            _ => false,
        }
    }

    /// Number of explicitly listed items, or `None` for inverted selections.
    pub fn explicit_len(&self) -> Option<usize> {
        match self {
            Self::Items(s) => Some(s.ids.len()),
            Self::Ids(s) => Some(s.ids.len()),
            Self::AllExcept(_) => None,
            Self::WithAdditional(s) => s.base.explicit_len().map(|n| n + s.additional.ids.len()),
        }
    }

    /// Number of selected items.
    ///
    /// Inverted selections ask their service for the count, so this can fail.
    pub fn size(&self) -> Result<u64> {
        match self {
            Self::AllExcept(s) => {
                let total = s.service.count_matching(&s.query).map_err(Error::Service)?;
                Ok(total.saturating_sub(s.excluded.len() as u64))
            }
            Self::WithAdditional(s) => Ok(s.base.size()? + s.additional.ids.len() as u64),
            _ => Ok(self.explicit_len().unwrap_or_default() as u64),
        }
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> Result<bool> {
        match self.explicit_len() {
            Some(n) => Ok(n == 0),
            None => Ok(self.size()? == 0),
        }
    }

    /// Returns `true` if `item` is selected.
    ///
    /// Never contacts a service; inverted selections assume the item
    /// matches their query.
    pub fn contains(&self, item: &T) -> bool {
        match self {
            Self::Items(s) => s.contains_id(&item.id()),
            Self::Ids(s) => s.ids.set.contains(&s.service.id_of(item)),
            Self::AllExcept(s) => !s.excluded.set.contains(&s.service.id_of(item)),
            Self::WithAdditional(s) => {
                s.additional.contains_id(&item.id()) || s.base.contains(item)
            }
        }
    }

    /// The identifiers this selection was built from.
    ///
    /// For an additional-items selection these are the base selection's ids.
    pub fn clicked_ids(&self) -> ClickedIds<ItemId<T>> {
        match self {
            Self::Items(s) => ClickedIds {
                ids: s.ids.order.clone(),
                inverted: false,
            },
            Self::Ids(s) => ClickedIds {
                ids: s.ids.order.clone(),
                inverted: false,
            },
            Self::AllExcept(s) => ClickedIds {
                ids: s.excluded.order.clone(),
                inverted: true,
            },
            Self::WithAdditional(s) => s.base.clicked_ids(),
        }
    }

    /// Iterate over the selected items, loading `block_size` at a time.
    pub fn iter(&self, block_size: usize) -> SelectionIter<'_, T> {
        SelectionIter::new(self, block_size)
    }

    /// Load all selected items.
    pub fn to_vec(&self, block_size: usize) -> Result<Vec<T>> {
        self.iter(block_size).collect()
    }

    /// A copy with `item` added or removed.
    ///
    /// For inverted selections this edits the excluded ids. For
    /// additional-items selections the item goes to the base selection;
    /// use [`with_additional_item`](Self::with_additional_item) for transient
    /// items.
    pub fn with_item(&self, item: &T, selected: bool) -> Self {
        match self {
            Self::Items(s) => Self::Items(s.with(item, selected)),
            Self::Ids(s) => {
                let mut ids = IdList::new(s.ids.order.iter().cloned());
                let id = s.service.id_of(item);
                if selected {
                    ids.push(id);
                } else {
                    ids.remove(&id);
                }
                Self::Ids(IdSelection {
                    ids: Arc::new(ids),
                    service: s.service.clone(),
                })
            }
            Self::AllExcept(s) => {
                let mut excluded = IdList::new(s.excluded.order.iter().cloned());
                let id = s.service.id_of(item);
                if selected {
                    excluded.remove(&id);
                } else {
                    excluded.push(id);
                }
                Self::AllExcept(InvertedSelection {
                    excluded: Arc::new(excluded),
                    service: s.service.clone(),
                    query: s.query.clone(),
                })
            }
            Self::WithAdditional(s) => Self::WithAdditional(AdditionalSelection {
                base: Box::new(s.base.with_item(item, selected)),
                additional: s.additional.clone(),
            }),
        }
    }

    /// A copy holding the new value of `item`, or `None` if the selection
    /// does not hold a value for its id. Only item selections hold values.
    pub(crate) fn with_refreshed(&self, item: &T) -> Option<Self> {
        match self {
            Self::Items(s) => s.replaced(item).map(Self::Items),
            Self::WithAdditional(s) => {
                let base = s.base.with_refreshed(item);
                let additional = s.additional.replaced(item);
                if base.is_none() && additional.is_none() {
                    return None;
                }
                Some(Self::WithAdditional(AdditionalSelection {
                    base: Box::new(base.unwrap_or_else(|| s.base.as_ref().clone())),
                    additional: additional.unwrap_or_else(|| s.additional.clone()),
                }))
            }
            Self::Ids(_) | Self::AllExcept(_) => None,
        }
    }

    /// A copy with the transient `item` added or removed.
    ///
    /// Non additional-items selections become the base of a new one.
    pub fn with_additional_item(&self, item: &T, selected: bool) -> Self {
        match self {
            Self::WithAdditional(s) => Self::WithAdditional(AdditionalSelection {
                base: s.base.clone(),
                additional: s.additional.with(item, selected),
            }),
            other => {
                let additional = if selected { vec![item.clone()] } else { Vec::new() };
                Self::with_additional(other.clone(), additional)
            }
        }
    }

    /// The base part of an additional-items selection, or the selection itself.
    pub fn base(&self) -> &Selection<T> {
        match self {
            Self::WithAdditional(s) => &s.base,
            other => other,
        }
    }

    /// The selected transient items of an additional-items selection.
    pub fn additional_items(&self) -> &[T] {
        match self {
            Self::WithAdditional(s) => s.additional.items(),
            _ => &[],
        }
    }

    /// The earliest explicitly selected item, if it can be named without a
    /// service call.
    pub(crate) fn first_explicit(&self) -> Option<Selection<T>> {
        self.pick_explicit(true)
    }

    /// The most recently explicitly selected item, as a one-item selection.
    pub(crate) fn last_explicit(&self) -> Option<Selection<T>> {
        self.pick_explicit(false)
    }

    fn pick_explicit(&self, first: bool) -> Option<Selection<T>> {
        let pick = |len: usize| if first { 0 } else { len.saturating_sub(1) };
        match self {
            Self::Items(s) if !s.items.is_empty() => {
                Some(Self::of_items([s.items[pick(s.items.len())].clone()]))
            }
            Self::Ids(s) if s.ids.len() > 0 => {
                let id = s.ids.order[pick(s.ids.len())].clone();
                Some(Self::of_ids(s.service.clone(), [id]))
            }
            Self::WithAdditional(s) => {
                let base = s.base.pick_explicit(first);
                let additional = s.additional.items.get(pick(s.additional.items.len())).cloned();
                // Transient items are selected after base items.
                match (base, additional, first) {
                    (Some(b), _, true) => Some(Self::with_additional(b, [])),
                    (_, Some(a), _) => Some(Self::with_additional(Self::empty(), [a])),
                    (Some(b), None, false) => Some(Self::with_additional(b, [])),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl<T: Item> fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Items(s) => f.debug_tuple("Items").field(&s.ids.order).finish(),
            Self::Ids(s) => f.debug_tuple("Ids").field(&s.ids.order).finish(),
            Self::AllExcept(s) => f
                .debug_struct("AllExcept")
                .field("excluded", &s.excluded.order)
                .field("query", &s.query)
                .finish(),
            Self::WithAdditional(s) => f
                .debug_struct("WithAdditional")
                .field("base", &s.base)
                .field("additional", &s.additional.ids.order)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bean, FakeService};

    #[test]
    fn test_item_selection_basics() {
        let sel = Selection::of_items([bean(1, "a"), bean(2, "b"), bean(1, "dup")]);
        assert_eq!(sel.explicit_len(), Some(2));
        assert!(sel.contains(&bean(1, "renamed")));
        assert!(!sel.contains(&bean(3, "c")));
        assert_eq!(sel.clicked_ids(), ClickedIds { ids: vec![1, 2], inverted: false });
        assert_eq!(sel.size().unwrap(), 2);
    }

    #[test]
    fn test_with_item_toggles() {
        let sel = Selection::of_items([bean(1, "a")]);
        let sel = sel.with_item(&bean(2, "b"), true);
        let sel = sel.with_item(&bean(1, "a"), false);
        assert_eq!(sel.clicked_ids().ids, vec![2]);
        assert!(Selection::<crate::test_support::Bean>::empty().is_empty().unwrap());
    }

    #[test]
    fn test_inverted_selection_size_and_contains() {
        let service = FakeService::with_beans(10);
        let handle = service.page_handle();
        let sel = Selection::all_except(handle, EffectiveQuery::default(), [3, 4]);

        assert!(sel.is_inverted());
        assert_eq!(sel.explicit_len(), None);
        assert_eq!(sel.size().unwrap(), 8);
        assert!(sel.contains(&bean(1, "")));
        assert!(!sel.contains(&bean(3, "")));

        let clicked = sel.clicked_ids();
        assert!(clicked.is_selection_with_inverted_ids());
        assert_eq!(clicked.ids, vec![3, 4]);

        let sel = sel.with_item(&bean(3, ""), true).with_item(&bean(9, ""), false);
        assert_eq!(sel.clicked_ids().ids, vec![4, 9]);
    }

    #[test]
    fn test_id_selection_contains() {
        let service = FakeService::with_beans(5);
        let sel = Selection::of_ids(service.id_handle(), [2, 4]);
        assert!(sel.contains(&bean(4, "")));
        assert!(!sel.contains(&bean(5, "")));
        assert_eq!(sel.kind(), "id");
    }

    #[test]
    fn test_additional_selection() {
        let base = Selection::of_items([bean(1, "a")]);
        let sel = Selection::with_additional(base, [bean(-1, "new")]);
        assert!(sel.contains(&bean(-1, "")));
        assert!(sel.contains(&bean(1, "")));
        assert_eq!(sel.size().unwrap(), 2);
        assert_eq!(sel.clicked_ids().ids, vec![1]);

        let sel = sel.with_additional_item(&bean(-1, "new"), false);
        assert!(sel.additional_items().is_empty());
        assert_eq!(sel.base().explicit_len(), Some(1));

        let nested = Selection::with_additional(sel.clone(), []);
        assert!(matches!(nested.base(), Selection::Items(_)));
    }

    #[test]
    fn test_refresh_replaces_item_value() {
        let sel = Selection::of_items([bean(1, "a"), bean(2, "b")]);
        let refreshed = sel.with_refreshed(&bean(2, "renamed")).unwrap();
        match &refreshed {
            Selection::Items(s) => {
                assert_eq!(s.items()[0].name, "a");
                assert_eq!(s.items()[1].name, "renamed");
            }
            other => panic!("unexpected selection {other:?}"),
        }
        assert!(sel.with_refreshed(&bean(3, "x")).is_none());

        let composite = Selection::with_additional(sel, [bean(-1, "draft")]);
        let refreshed = composite.with_refreshed(&bean(-1, "edited")).unwrap();
        assert_eq!(refreshed.additional_items()[0].name, "edited");
        assert_eq!(refreshed.base().explicit_len(), Some(2));
    }

    #[test]
    fn test_nested_additional_keeps_inner_items() {
        let inner =
            Selection::with_additional(Selection::of_items([bean(1, "a")]), [bean(900, "x")]);
        let outer = Selection::with_additional(inner, [bean(901, "y"), bean(900, "dup")]);
        assert!(outer.contains(&bean(900, "")));
        assert!(outer.contains(&bean(901, "")));
        assert!(outer.contains(&bean(1, "")));
        let ids: Vec<_> = outer.additional_items().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![900, 901]);
        assert!(matches!(outer.base(), Selection::Items(_)));
    }

    #[test]
    fn test_last_and_first_explicit() {
        let sel = Selection::of_items([bean(1, "a"), bean(2, "b"), bean(3, "c")]);
        assert_eq!(sel.last_explicit().unwrap().clicked_ids().ids, vec![3]);
        assert_eq!(sel.first_explicit().unwrap().clicked_ids().ids, vec![1]);
        assert!(Selection::<crate::test_support::Bean>::empty().last_explicit().is_none());
    }

    #[test]
    fn test_select_mode_resolve() {
        assert_eq!(SelectMode::Default.resolve(), SelectMode::Single);
        assert_eq!(SelectMode::Multi.resolve(), SelectMode::Multi);
    }
}
