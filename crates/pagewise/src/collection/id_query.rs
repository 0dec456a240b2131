//! Collection backed by an id query service.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::modification::{ModificationHandler, ModificationTracker, Modifications};
use crate::query::QueryParams;
use crate::selection::{Selection, SelectionHandler, SelectionScope};
use crate::service::{fetch_items_in_order, IdQueryService, ServiceHandle};

use super::page_query::remove_from_service;
use super::{
    expect_plain_selection, forward_query_events, request_removal, CountCache, PageableCollection,
    Paging,
};

/// The last page loaded, with the query revision it was loaded under.
struct PageWindow<T> {
    revision: u64,
    start: u64,
    size: usize,
    items: Arc<Vec<T>>,
}

/// A pageable collection that loads pages from an [`IdQueryService`].
///
/// A page is loaded in two steps: `fetch_ids` for the page window, then
/// `fetch_items_for_ids` for those ids. Items are returned in the order of
/// the ids. The current page is kept until the query, the page or the page
/// size changes.
pub struct IdQueryCollection<T: Item> {
    service: Arc<dyn IdQueryService<T>>,
    params: Arc<QueryParams>,
    window: Mutex<Option<PageWindow<T>>>,
    counts: CountCache,
    paging: Paging,
    selection: SelectionHandler<T>,
    modifications: ModificationTracker<T>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
}

impl<T: Item> IdQueryCollection<T> {
    /// Create a collection using the service's query options.
    pub fn new(service: Arc<dyn IdQueryService<T>>, config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        let params = Arc::new(QueryParams::new(service.query_options()));
        let notifier = Arc::new(ChangeNotifier::new());
        forward_query_events(&params, &notifier);

        let scope = SelectionScope::Query {
            service: ServiceHandle::Id(service.clone()),
            params: params.clone(),
        };
        let selection = SelectionHandler::new(scope, notifier.clone(), &config);

        Ok(Self {
            service,
            params,
            window: Mutex::new(None),
            counts: CountCache::default(),
            paging: Paging::new(&config),
            selection,
            modifications: ModificationTracker::new(notifier.clone()),
            notifier,
        })
    }

    fn sync(&self) -> Result<()> {
        self.paging
            .sync(self.params.revision(), &self.notifier, || self.num_of_items())
    }

    fn load_page(&self, start: u64, size: usize) -> Result<Vec<T>> {
        let query = self.params.effective_query();
        debug!(target: targets::COLLECTION, start, size, "fetching page ids");
        let ids = self
            .service
            .fetch_ids(&query, start, size)
            .map_err(Error::Service)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(target: targets::COLLECTION, count = ids.len(), "fetching page items");
        fetch_items_in_order(self.service.as_ref(), &ids).map_err(Error::Service)
    }
}

impl<T: Item> PageableCollection<T> for IdQueryCollection<T> {
    fn items_on_page(&self) -> Result<Vec<T>> {
        self.sync()?;
        if !self.params.is_exec_query() {
            return Ok(Vec::new());
        }
        let revision = self.params.revision();
        let (start, size) = self.paging.window();

        if let Some(window) = self.window.lock().as_ref() {
            if window.revision == revision && window.start == start && window.size == size {
                trace!(target: targets::COLLECTION, start, "page cache hit");
                return Ok(window.items.as_ref().clone());
            }
        }

        let items = Arc::new(self.load_page(start, size)?);
        *self.window.lock() = Some(PageWindow {
            revision,
            start,
            size,
            items: items.clone(),
        });
        Ok(items.as_ref().clone())
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
        self.counts
            .filtered(&self.params, |q| self.service.count_matching(q))
    }

    fn unfiltered_num_of_items(&self) -> Result<u64> {
        self.counts
            .unfiltered(&self.params, |q| self.service.count_matching(q))
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
        *self.window.lock() = None;
        self.counts.clear();
        self.paging.invalidate();
    }
}

impl<T: Item> ModificationHandler<T> for IdQueryCollection<T> {
    fn add_item(&self, item: T) -> Result<()> {
        self.modifications.add(item, |_| ())
    }

    fn update_item(&self, item: &T, is_updated: bool) -> Result<()> {
        self.modifications.update(item, is_updated, |_| ())
    }

    fn remove_items(&self, selection: &Selection<T>) -> Result<bool> {
        expect_plain_selection(selection)?;
        let Some(event) = request_removal(&self.notifier, selection) else {
            return Ok(false);
        };
        remove_from_service(&ServiceHandle::Id(self.service.clone()), &self.params, selection)?;

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
