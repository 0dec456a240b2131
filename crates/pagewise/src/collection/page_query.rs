//! Collection backed by a page query service.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::PageQueryCollectionCache;
use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::modification::{ModificationHandler, ModificationTracker, Modifications};
use crate::query::QueryParams;
use crate::selection::{Selection, SelectionHandler, SelectionScope};
use crate::service::{PageQueryService, ServiceHandle};

use super::{
    expect_plain_selection, forward_query_events, request_removal, CountCache, PageableCollection,
    Paging,
};

/// A pageable collection that loads pages from a [`PageQueryService`].
///
/// Pages are served from a [`PageQueryCollectionCache`] whose block size
/// equals the page size, so showing a page costs at most one
/// `fetch_page` call and nothing beyond the current page window is
/// loaded. The item count is fetched once per effective query.
///
/// Added items are only registered; they do not show up in the pages until
/// the service returns them. Wrap the collection in an
/// [`AdditionalItemsCollection`](super::AdditionalItemsCollection) to show
/// them.
pub struct PageQueryCollection<T: Item> {
    service: Arc<dyn PageQueryService<T>>,
    params: Arc<QueryParams>,
    cache: RwLock<Arc<PageQueryCollectionCache<T>>>,
    max_cached_blocks: Option<usize>,
    counts: CountCache,
    paging: Paging,
    selection: SelectionHandler<T>,
    modifications: ModificationTracker<T>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
}

impl<T: Item> PageQueryCollection<T> {
    /// Create a collection using the service's query options.
    pub fn new(service: Arc<dyn PageQueryService<T>>, config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        let params = Arc::new(QueryParams::new(service.query_options()));
        let notifier = Arc::new(ChangeNotifier::new());
        forward_query_events(&params, &notifier);

        let scope = SelectionScope::Query {
            service: ServiceHandle::Page(service.clone()),
            params: params.clone(),
        };
        let selection = SelectionHandler::new(scope, notifier.clone(), &config);
        let cache = Self::new_cache(&service, &params, config.page_size, config.max_cached_blocks);

        Ok(Self {
            service,
            params,
            cache: RwLock::new(cache),
            max_cached_blocks: config.max_cached_blocks,
            counts: CountCache::default(),
            paging: Paging::new(&config),
            selection,
            modifications: ModificationTracker::new(notifier.clone()),
            notifier,
        })
    }

    /// The page cache in use.
    pub fn cache(&self) -> Arc<PageQueryCollectionCache<T>> {
        self.cache.read().clone()
    }

    fn new_cache(
        service: &Arc<dyn PageQueryService<T>>,
        params: &Arc<QueryParams>,
        page_size: usize,
        max_cached_blocks: Option<usize>,
    ) -> Arc<PageQueryCollectionCache<T>> {
        Arc::new(
            PageQueryCollectionCache::new(service.clone(), params.clone(), page_size.max(1))
                .with_max_blocks(max_cached_blocks),
        )
    }

    fn sync(&self) -> Result<()> {
        self.paging
            .sync(self.params.revision(), &self.notifier, || self.num_of_items())
    }
}

impl<T: Item> PageableCollection<T> for PageQueryCollection<T> {
    fn items_on_page(&self) -> Result<Vec<T>> {
        self.sync()?;
        let (start, size) = self.paging.window();
        self.cache().get_range(start, size)
    }

    fn page_size(&self) -> usize {
        self.paging.page_size()
    }

    fn set_page_size(&self, page_size: usize) -> Result<()> {
        let n = self.num_of_items()?;
        self.paging.set_page_size(page_size, n, &self.notifier)?;
        let mut cache = self.cache.write();
        if cache.block_size() != self.paging.page_size() {
            *cache = Self::new_cache(
                &self.service,
                &self.params,
                self.paging.page_size(),
                self.max_cached_blocks,
            );
        }
        Ok(())
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
        self.cache().clear();
        self.counts.clear();
        self.paging.invalidate();
    }
}

impl<T: Item> ModificationHandler<T> for PageQueryCollection<T> {
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
        remove_from_service(
            &ServiceHandle::Page(self.service.clone()),
            &self.params,
            selection,
        )?;

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

/// Remove a selection through the backing service.
///
/// Inverted selections are removed against the query they were made for.
pub(super) fn remove_from_service<T: Item>(
    service: &ServiceHandle<T>,
    params: &QueryParams,
    selection: &Selection<T>,
) -> Result<()> {
    let query = match selection {
        Selection::AllExcept(s) => s.query().clone(),
        _ => params.effective_query(),
    };
    let ids = selection.clicked_ids();
    debug!(
        target: targets::MODIFICATION,
        ids = ids.ids.len(),
        inverted = ids.inverted,
        "removing items from backing store"
    );
    service.remove_items(&query, &ids).map_err(|e| {
        warn!(target: targets::MODIFICATION, error = %e, "backing store rejected removal");
        Error::Service(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CompareOp, FilterExpr};
    use crate::selection::SelectMode;
    use crate::test_support::{bean, Bean, FakeService};

    fn collection(n: i64, page_size: usize) -> (Arc<FakeService>, PageQueryCollection<Bean>) {
        let service = FakeService::with_beans(n);
        let config = CollectionConfig::default()
            .with_page_size(page_size)
            .with_select_mode(SelectMode::Multi);
        let c = PageQueryCollection::new(service.clone(), config).unwrap();
        (service, c)
    }

    fn ids(items: &[Bean]) -> Vec<i64> {
        items.iter().map(|b| b.id).collect()
    }

    #[test]
    fn test_one_fetch_per_page() {
        let (service, c) = collection(25, 10);
        assert_eq!(ids(&c.items_on_page().unwrap()), (1..=10).collect::<Vec<_>>());
        assert_eq!(service.calls("fetch_page"), 1);
        c.items_on_page().unwrap();
        assert_eq!(service.calls("fetch_page"), 1);

        c.last_page().unwrap();
        assert_eq!(ids(&c.items_on_page().unwrap()), (21..=25).collect::<Vec<_>>());
        assert_eq!(service.calls("fetch_page"), 2);
    }

    #[test]
    fn test_count_cached_per_query() {
        let (service, c) = collection(25, 10);
        assert_eq!(c.num_of_items().unwrap(), 25);
        assert_eq!(c.num_of_items().unwrap(), 25);
        assert_eq!(service.calls("count_matching"), 1);

        c.query_params()
            .set_filter(Some(FilterExpr::compare("id", CompareOp::Gt, 20)))
            .unwrap();
        assert_eq!(c.num_of_items().unwrap(), 5);
        assert_eq!(service.calls("count_matching"), 2);
        assert_eq!(c.unfiltered_num_of_items().unwrap(), 25);
    }

    #[test]
    fn test_page_size_change_rebuilds_cache() {
        let (service, c) = collection(25, 10);
        c.items_on_page().unwrap();
        c.set_page_size(4).unwrap();
        assert_eq!(c.cache().block_size(), 4);
        assert_eq!(ids(&c.items_on_page().unwrap()), vec![1, 2, 3, 4]);
        assert_eq!(service.calls("fetch_page"), 2);
    }

    #[test]
    fn test_remove_selected_items() {
        let (service, c) = collection(12, 5);
        c.selection_handler()
            .select_items(&[bean(2, ""), bean(3, "")], true)
            .unwrap();
        assert!(c.remove_selected_items().unwrap());

        assert_eq!(service.stored_ids().len(), 10);
        assert_eq!(ids(&c.items_on_page().unwrap()), vec![1, 4, 5, 6, 7]);
        assert_eq!(c.num_of_items().unwrap(), 10);
        assert!(c.selection().is_empty().unwrap());
    }

    #[test]
    fn test_remove_all_except() {
        let (service, c) = collection(12, 5);
        c.selection_handler().select_all(true).unwrap();
        c.selection_handler().select(&bean(7, ""), false).unwrap();
        assert!(c.remove_selected_items().unwrap());
        assert_eq!(service.stored_ids(), vec![7]);
        assert_eq!(c.num_of_items().unwrap(), 1);
    }

    #[test]
    fn test_failed_removal_leaves_state() {
        let (service, c) = collection(12, 5);
        c.items_on_page().unwrap();
        c.add_item(bean(-1, "draft")).unwrap();
        c.selection_handler().select(&bean(2, ""), true).unwrap();
        service.fail_removal(true);
        service.reset_calls();

        let err = c.remove_selected_items().unwrap_err();
        assert!(err.is_service_failure());
        assert_eq!(c.selection().clicked_ids().ids, vec![2]);
        assert_eq!(c.modifications().added_items().len(), 1);
        assert!(c.modifications().removed_items().is_empty());

        c.items_on_page().unwrap();
        assert_eq!(service.calls("fetch_page"), 0);
    }

    #[test]
    fn test_rejects_additional_selection() {
        let (_, c) = collection(3, 5);
        let sel = Selection::with_additional(Selection::empty(), [bean(-1, "")]);
        assert!(matches!(
            c.remove_items(&sel).unwrap_err(),
            Error::SelectionMismatch { .. }
        ));
    }

    #[test]
    fn test_removing_nothing_skips_service() {
        let (service, c) = collection(3, 5);
        assert!(!c.remove_selected_items().unwrap());
        assert_eq!(service.calls("remove_items"), 0);
        assert!(!c.modifications().is_modified());
    }
}
