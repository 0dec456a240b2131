//! Backing query services.
//!
//! A collection that is not held in memory talks to one of two kinds of
//! service:
//!
//! - [`PageQueryService`] returns items for a `(start, page_size)` window.
//! - [`IdQueryService`] returns identifiers for a window; the items are then
//!   loaded with [`QueryService::fetch_items_for_ids`].
//!
//! Both receive the [`EffectiveQuery`] of the collection and must apply its
//! filter and sort order the same way for counts and windows.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::ServiceResult;
use crate::item::{Item, ItemId};
use crate::logging::targets;
use crate::query::{EffectiveQuery, QueryOptions};
use crate::selection::ClickedIds;

/// Operations shared by every backing query service.
pub trait QueryService<T: Item>: Send + Sync {
    /// The attributes this service can filter and sort on.
    fn query_options(&self) -> QueryOptions;

    /// Number of items matching `query`.
    fn count_matching(&self, query: &EffectiveQuery) -> ServiceResult<u64>;

    /// Load the items with the given identifiers.
    ///
    /// Unknown identifiers are skipped. The order of the result does not
    /// matter; callers restore the order of `ids`.
    fn fetch_items_for_ids(&self, ids: &[ItemId<T>]) -> ServiceResult<Vec<T>>;

    /// The identifier of an item.
    fn id_of(&self, item: &T) -> ItemId<T> {
        item.id()
    }

    /// Remove the items described by `ids` from the backing store.
    ///
    /// For an inverted id set, every item matching `query` except the listed
    /// ones is removed. Must either remove all or nothing.
    fn remove_items(
        &self,
        query: &EffectiveQuery,
        ids: &ClickedIds<ItemId<T>>,
    ) -> ServiceResult<()> {
        let _ = (query, ids);
        Err("this service does not support removing items".into())
    }
}

/// A service that pages over items directly.
pub trait PageQueryService<T: Item>: QueryService<T> {
    /// Up to `page_size` items matching `query`, starting at `start`.
    fn fetch_page(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<T>>;
}

/// A service that pages over identifiers.
pub trait IdQueryService<T: Item>: QueryService<T> {
    /// Up to `page_size` identifiers of items matching `query`, starting at `start`.
    fn fetch_ids(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<ItemId<T>>>;
}

/// Either kind of query service.
pub enum ServiceHandle<T: Item> {
    Page(Arc<dyn PageQueryService<T>>),
    Id(Arc<dyn IdQueryService<T>>),
}

impl<T: Item> Clone for ServiceHandle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Page(s) => Self::Page(s.clone()),
            Self::Id(s) => Self::Id(s.clone()),
        }
    }
}

impl<T: Item> ServiceHandle<T> {
    fn base(&self) -> &dyn QueryService<T> {
        match self {
            Self::Page(s) => s.as_ref(),
            Self::Id(s) => s.as_ref(),
        }
    }

    /// See [`QueryService::query_options`].
    pub fn query_options(&self) -> QueryOptions {
        self.base().query_options()
    }

    /// See [`QueryService::count_matching`].
    pub fn count_matching(&self, query: &EffectiveQuery) -> ServiceResult<u64> {
        self.base().count_matching(query)
    }

    /// See [`QueryService::id_of`].
    pub fn id_of(&self, item: &T) -> ItemId<T> {
        self.base().id_of(item)
    }

    /// See [`QueryService::remove_items`].
    pub fn remove_items(
        &self,
        query: &EffectiveQuery,
        ids: &ClickedIds<ItemId<T>>,
    ) -> ServiceResult<()> {
        self.base().remove_items(query, ids)
    }

    /// Load items for `ids`, in the order of `ids`.
    pub fn fetch_items_for_ids(&self, ids: &[ItemId<T>]) -> ServiceResult<Vec<T>> {
        fetch_items_in_order(self.base(), ids)
    }

    /// Load up to `len` items matching `query` starting at `start`.
    pub fn fetch_range(
        &self,
        query: &EffectiveQuery,
        start: u64,
        len: usize,
    ) -> ServiceResult<Vec<T>> {
        match self {
            Self::Page(s) => s.fetch_page(query, start, len),
            Self::Id(s) => {
                let ids = s.fetch_ids(query, start, len)?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                fetch_items_in_order(s.as_ref(), &ids)
            }
        }
    }
}

/// Load items for `ids` and return them in the order of `ids`.
///
/// Identifiers the service does not return are skipped.
pub(crate) fn fetch_items_in_order<T: Item, S: QueryService<T> + ?Sized>(
    service: &S,
    ids: &[ItemId<T>],
) -> ServiceResult<Vec<T>> {
    let fetched = service.fetch_items_for_ids(ids)?;
    let mut by_id: HashMap<ItemId<T>, T> = fetched
        .into_iter()
        .map(|item| (service.id_of(&item), item))
        .collect();

    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        match by_id.remove(id) {
            Some(item) => ordered.push(item),
            None => warn!(target: targets::COLLECTION, ?id, "service returned no item for id"),
        }
    }
    Ok(ordered)
}
