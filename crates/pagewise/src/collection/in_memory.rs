//! Collection over items held in memory.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::modification::{ModificationHandler, ModificationTracker, Modifications};
use crate::query::{ItemAttributes, QueryOptions, QueryParams};
use crate::selection::{Selection, SelectionHandler, SelectionScope};

use super::{
    expect_plain_selection, forward_query_events, request_removal, PageableCollection, Paging,
};

/// Backing items plus the filtered and sorted view of them.
struct Store<T> {
    items: RwLock<Vec<T>>,
    params: Arc<QueryParams>,
    view: Mutex<Option<(u64, Arc<Vec<T>>)>>,
}

impl<T: Item + ItemAttributes> Store<T> {
    /// The items matching the effective query, in effective sort order.
    fn view(&self) -> Arc<Vec<T>> {
        let revision = self.params.revision();
        let mut view = self.view.lock();
        if let Some((rev, items)) = view.as_ref() {
            if *rev == revision {
                return items.clone();
            }
        }
        let items = if self.params.is_exec_query() {
            Arc::new(self.params.effective_query().apply(self.items.read().as_slice()))
        } else {
            Arc::new(Vec::new())
        };
        debug!(
            target: targets::COLLECTION,
            revision,
            len = items.len(),
            "rebuilt in-memory view"
        );
        *view = Some((revision, items.clone()));
        items
    }

    fn invalidate(&self) {
        *self.view.lock() = None;
    }
}

/// A pageable collection over a `Vec` of items.
///
/// Filtering and sorting run in memory through [`ItemAttributes`]. Sorting
/// is stable, so items that compare equal keep their insertion order.
///
/// # Example
///
/// ```ignore
/// let collection = InMemCollection::new(people, CollectionConfig::default())?;
/// collection.query_params().set_sort_order(Some(SortOrder::asc("name")))?;
/// let first_page = collection.items_on_page()?;
/// ```
pub struct InMemCollection<T: Item + ItemAttributes> {
    store: Arc<Store<T>>,
    params: Arc<QueryParams>,
    paging: Paging,
    selection: SelectionHandler<T>,
    modifications: ModificationTracker<T>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
}

impl<T: Item + ItemAttributes> InMemCollection<T> {
    /// Create a collection accepting any filter and sort order.
    pub fn new(items: Vec<T>, config: CollectionConfig) -> Result<Self> {
        Self::with_options(items, QueryOptions::permissive(), config)
    }

    /// Create a collection restricted to the given query options.
    pub fn with_options(
        items: Vec<T>,
        options: QueryOptions,
        config: CollectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let params = Arc::new(QueryParams::new(options));
        let store = Arc::new(Store {
            items: RwLock::new(items),
            params: params.clone(),
            view: Mutex::new(None),
        });
        let notifier = Arc::new(ChangeNotifier::new());
        forward_query_events(&params, &notifier);

        let view_store = store.clone();
        let scope = SelectionScope::InMemory(Arc::new(move || view_store.view().as_ref().clone()));
        let selection = SelectionHandler::new(scope, notifier.clone(), &config);

        Ok(Self {
            store,
            params,
            paging: Paging::new(&config),
            selection,
            modifications: ModificationTracker::new(notifier.clone()),
            notifier,
        })
    }

    /// A copy of all backing items, unfiltered and unsorted.
    pub fn all_items(&self) -> Vec<T> {
        self.store.items.read().clone()
    }

    fn is_stored(&self, item: &T) -> bool {
        let id = item.id();
        self.store.items.read().iter().any(|i| i.id() == id)
    }

    fn sync(&self) -> Result<()> {
        self.paging.sync(self.params.revision(), &self.notifier, || {
            Ok(self.store.view().len() as u64)
        })
    }
}

impl<T: Item + ItemAttributes> PageableCollection<T> for InMemCollection<T> {
    fn items_on_page(&self) -> Result<Vec<T>> {
        self.sync()?;
        let view = self.store.view();
        let (start, size) = self.paging.window();
        let start = (start as usize).min(view.len());
        let end = (start + size).min(view.len());
        Ok(view[start..end].to_vec())
    }

    fn page_size(&self) -> usize {
        self.paging.page_size()
    }

    fn set_page_size(&self, page_size: usize) -> Result<()> {
        let n = self.num_of_items()?;
        self.paging.set_page_size(page_size, n, &self.notifier)
    }

    fn page_idx(&self) -> usize {
        self.paging.page_idx()
    }

    fn set_page_idx(&self, page_idx: usize) -> Result<()> {
        self.sync()?;
        let n = self.num_of_items()?;
        self.paging.set_page_idx(page_idx, n, &self.notifier)
    }

    fn num_of_items(&self) -> Result<u64> {
        Ok(self.store.view().len() as u64)
    }

    fn unfiltered_num_of_items(&self) -> Result<u64> {
        if !self.params.is_exec_query() {
            return Ok(0);
        }
        Ok(self.store.items.read().len() as u64)
    }

    fn query_params(&self) -> &Arc<QueryParams> {
        &self.params
    }

    fn selection_handler(&self) -> &SelectionHandler<T> {
        &self.selection
    }

    fn modification_handler(&self) -> &dyn ModificationHandler<T> {
        self
    }

    fn notifier(&self) -> &Arc<ChangeNotifier<ChangeEvent<T>>> {
        &self.notifier
    }

    fn clear_caches(&self) {
        self.store.invalidate();
        self.paging.invalidate();
    }
}

impl<T: Item + ItemAttributes> ModificationHandler<T> for InMemCollection<T> {
    /// Append `item` to the backing items.
    ///
    /// An item whose id is already stored replaces the stored value and is
    /// registered as updated instead.
    fn add_item(&self, item: T) -> Result<()> {
        if self.is_stored(&item) {
            return self.update_item(&item, true);
        }
        self.modifications.add(item, |item| {
            self.store.items.write().push(item.clone());
            self.store.invalidate();
        })
    }

    /// Replace the stored value of `item`, including a selected copy of it.
    fn update_item(&self, item: &T, is_updated: bool) -> Result<()> {
        self.modifications.update(item, is_updated, |item| {
            let id = item.id();
            if let Some(existing) = self.store.items.write().iter_mut().find(|i| i.id() == id) {
                *existing = item.clone();
            }
            self.store.invalidate();
            self.selection.refresh_item(item);
        })
    }

    /// Remove the stored items of `selection`. Returns `Ok(false)` if none
    /// of them is stored.
    fn remove_items(&self, selection: &Selection<T>) -> Result<bool> {
        expect_plain_selection(selection)?;
        if !self.store.items.read().iter().any(|i| selection.contains(i)) {
            return Ok(false);
        }
        let Some(event) = request_removal(&self.notifier, selection) else {
            return Ok(false);
        };

        let removed = {
            let mut items = self.store.items.write();
            let before = items.len();
            items.retain(|i| !selection.contains(i));
            before - items.len()
        };
        debug!(target: targets::MODIFICATION, removed, "removed in-memory items");

        self.modifications.register_removed(selection);
        self.clear_caches();
        self.selection.clear_forced();
        self.notifier.notify(event);
        Ok(true)
    }

    fn remove_selected_items(&self) -> Result<bool> {
        self.remove_items(&self.selection.selection())
    }

    fn clear_registered_modifications(&self) -> Result<()> {
        self.modifications.clear_all()
    }

    fn modifications(&self) -> Modifications<T> {
        self.modifications.snapshot()
    }
}

#[cfg(test)]
static_assertions::assert_impl_all!(InMemCollection<crate::test_support::Bean>: Send, Sync);
