//! Change events.
//!
//! Every mutating operation announces itself twice on a
//! [`ChangeNotifier`](pagewise_core::ChangeNotifier): once to the vetoable
//! listeners before anything changes, then to the committed listeners after
//! the change has been applied. Both phases carry the same event value.

use std::fmt;

use crate::item::Item;
use crate::query::{FilterExpr, SortOrder};
use crate::selection::Selection;

/// Broad category of a change, for listeners that only care about one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Selection,
    Filter,
    Page,
    Modification,
}

/// A change of the query parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// The effective filter (base filter combined with the user filter) changed.
    EffectiveFilter {
        old: Option<FilterExpr>,
        new: Option<FilterExpr>,
    },
    /// The effective sort order changed.
    EffectiveSortOrder {
        old: Option<SortOrder>,
        new: Option<SortOrder>,
    },
    /// Query execution was switched on or off.
    ExecQuery { exec: bool },
}

/// A change of a pageable collection.
#[derive(Clone)]
pub enum ChangeEvent<T: Item> {
    /// The selection is replaced.
    Selection {
        old: Selection<T>,
        new: Selection<T>,
    },
    /// A query parameter changed. Forwarded from the collection's
    /// [`QueryParams`](crate::query::QueryParams).
    Query(QueryEvent),
    /// The current page index changed.
    PageIdx { old: usize, new: usize },
    /// The page size changed.
    PageSize { old: usize, new: usize },
    /// An item was registered as added.
    ItemAdded(T),
    /// An item was registered as updated (`true`) or no longer updated (`false`).
    ItemUpdated { item: T, updated: bool },
    /// The items of a selection are removed from the backing store.
    ItemsRemoved(Selection<T>),
    /// All registered modifications were dropped.
    ModificationsCleared,
}

impl<T: Item> ChangeEvent<T> {
    /// The category of this event.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Selection { .. } => ChangeKind::Selection,
            Self::Query(_) => ChangeKind::Filter,
            Self::PageIdx { .. } | Self::PageSize { .. } => ChangeKind::Page,
            Self::ItemAdded(_)
            | Self::ItemUpdated { .. }
            | Self::ItemsRemoved(_)
            | Self::ModificationsCleared => ChangeKind::Modification,
        }
    }
}

// Items are shown by id only, so `T` need not implement `Debug`.
impl<T: Item> fmt::Debug for ChangeEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection { old, new } => f
                .debug_struct("Selection")
                .field("old", old)
                .field("new", new)
                .finish(),
            Self::Query(event) => f.debug_tuple("Query").field(event).finish(),
            Self::PageIdx { old, new } => f
                .debug_struct("PageIdx")
                .field("old", old)
                .field("new", new)
                .finish(),
            Self::PageSize { old, new } => f
                .debug_struct("PageSize")
                .field("old", old)
                .field("new", new)
                .finish(),
            Self::ItemAdded(item) => f.debug_tuple("ItemAdded").field(&item.id()).finish(),
            Self::ItemUpdated { item, updated } => f
                .debug_struct("ItemUpdated")
                .field("id", &item.id())
                .field("updated", updated)
                .finish(),
            Self::ItemsRemoved(selection) => {
                f.debug_tuple("ItemsRemoved").field(selection).finish()
            }
            Self::ModificationsCleared => f.write_str("ModificationsCleared"),
        }
    }
}
