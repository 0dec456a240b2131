//! Pageable collections.
//!
//! A [`PageableCollection`] presents a possibly very large item set one page
//! at a time, together with its query parameters, selection and
//! modification bookkeeping. Four strategies are provided:
//!
//! | Type | Items come from |
//! |------|-----------------|
//! | [`InMemCollection`] | a `Vec` filtered and sorted in memory |
//! | [`PageQueryCollection`] | a [`PageQueryService`] through a block cache |
//! | [`IdQueryCollection`] | an [`IdQueryService`], ids first, then items |
//! | [`AdditionalItemsCollection`] | another collection, followed by transient items |
//!
//! # Page index
//!
//! The page index is always kept in range. When the item count shrinks
//! (filter change, page size change, removal) the index is clamped to the
//! last page on the next read, never reset to the first page.
//!
//! [`PageQueryService`]: crate::service::PageQueryService
//! [`IdQueryService`]: crate::service::IdQueryService

mod builder;
mod id_query;
mod in_memory;
mod page_query;
mod pager;
mod with_additional;

use std::sync::{Arc, Weak};

use pagewise_core::ChangeNotifier;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, ServiceResult};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::modification::ModificationHandler;
use crate::query::{EffectiveQuery, QueryOptions, QueryParams};
use crate::selection::{Selection, SelectionHandler};

pub use builder::{build_collection, Backing, CollectionBuilder, InMemoryItems};
pub use id_query::IdQueryCollection;
pub use in_memory::InMemCollection;
pub use page_query::PageQueryCollection;
pub use pager::{num_of_pages, PageInfo};
pub use with_additional::AdditionalItemsCollection;

pub(crate) use pager::Paging;

/// A collection that is read one page at a time.
///
/// All methods take `&self`; implementations use interior mutability and
/// are `Send + Sync`. Reads may contact a backing service and therefore
/// return `Result`.
pub trait PageableCollection<T: Item>: Send + Sync {
    /// The items of the current page, in query order.
    fn items_on_page(&self) -> Result<Vec<T>>;

    /// Number of items per page.
    fn page_size(&self) -> usize;

    /// Change the page size. The page index is clamped to the new page count.
    fn set_page_size(&self, page_size: usize) -> Result<()>;

    /// Zero-based index of the current page.
    fn page_idx(&self) -> usize;

    /// Move to another page.
    ///
    /// Out-of-range indices are clamped or rejected, as configured by
    /// [`PageIndexPolicy`](crate::config::PageIndexPolicy).
    fn set_page_idx(&self, page_idx: usize) -> Result<()>;

    /// Number of items matching the effective filter.
    fn num_of_items(&self) -> Result<u64>;

    /// Number of items without any filter.
    fn unfiltered_num_of_items(&self) -> Result<u64>;

    /// The query parameters of this collection.
    fn query_params(&self) -> &Arc<QueryParams>;

    /// The selection handler of this collection.
    fn selection_handler(&self) -> &SelectionHandler<T>;

    /// The modification handler of this collection.
    fn modification_handler(&self) -> &dyn ModificationHandler<T>;

    /// Notifier for every change of this collection, including forwarded
    /// query parameter changes.
    fn notifier(&self) -> &Arc<ChangeNotifier<ChangeEvent<T>>>;

    /// Drop every cached page and count.
    fn clear_caches(&self);

    /// The declared query capabilities.
    fn query_options(&self) -> &QueryOptions {
        self.query_params().options()
    }

    /// Number of pages. Always at least 1.
    fn num_of_pages(&self) -> Result<usize> {
        Ok(num_of_pages(self.num_of_items()?, self.page_size()))
    }

    /// Summary of the current page.
    fn page_info(&self) -> Result<PageInfo> {
        let num_of_items = self.num_of_items()?;
        let pages = num_of_pages(num_of_items, self.page_size());
        let page_idx = self.page_idx().min(pages - 1);
        Ok(PageInfo::new(page_idx, self.page_size(), num_of_items))
    }

    /// Go to the first page.
    fn first_page(&self) -> Result<()> {
        self.set_page_idx(0)
    }

    /// Go to the previous page. Returns `false` on the first page.
    fn prev_page(&self) -> Result<bool> {
        let idx = self.page_idx();
        if idx == 0 {
            return Ok(false);
        }
        self.set_page_idx(idx - 1)?;
        Ok(true)
    }

    /// Go to the next page. Returns `false` on the last page.
    fn next_page(&self) -> Result<bool> {
        let idx = self.page_idx();
        if idx + 1 >= self.num_of_pages()? {
            return Ok(false);
        }
        self.set_page_idx(idx + 1)?;
        Ok(true)
    }

    /// Go to the last page.
    fn last_page(&self) -> Result<()> {
        let last = self.num_of_pages()? - 1;
        self.set_page_idx(last)
    }

    /// The current selection.
    fn selection(&self) -> Selection<T> {
        self.selection_handler().selection()
    }
}

/// Relay query parameter changes to a collection notifier.
///
/// The relay holds the notifier weakly, so dropping the collection ends it.
pub(crate) fn forward_query_events<T: Item>(
    params: &QueryParams,
    notifier: &Arc<ChangeNotifier<ChangeEvent<T>>>,
) {
    let weak: Weak<ChangeNotifier<ChangeEvent<T>>> = Arc::downgrade(notifier);
    params.notifier().connect_vetoable(move |event| match weak.upgrade() {
        Some(n) => n.request(&ChangeEvent::Query(event.clone())),
        None => Ok(()),
    });
    let weak = Arc::downgrade(notifier);
    params.notifier().connect(move |event| {
        if let Some(n) = weak.upgrade() {
            n.notify(ChangeEvent::Query(event.clone()));
        }
    });
}

/// Ask vetoable listeners whether `selection` may be removed.
///
/// Returns the event to announce on success, `None` on a veto. An empty
/// explicit selection removes nothing and is not offered to listeners.
pub(crate) fn request_removal<T: Item>(
    notifier: &ChangeNotifier<ChangeEvent<T>>,
    selection: &Selection<T>,
) -> Option<ChangeEvent<T>> {
    if selection.explicit_len() == Some(0) {
        trace!(target: targets::MODIFICATION, "nothing to remove");
        return None;
    }
    let event = ChangeEvent::ItemsRemoved(selection.clone());
    match notifier.request(&event) {
        Ok(()) => Some(event),
        Err(veto) => {
            debug!(target: targets::MODIFICATION, reason = veto.reason(), "removal vetoed");
            None
        }
    }
}

/// Reject additional-items selections on collections without transient items.
pub(crate) fn expect_plain_selection<T: Item>(selection: &Selection<T>) -> Result<()> {
    match selection {
        Selection::WithAdditional(_) => Err(Error::SelectionMismatch {
            expected: "item, id or inverted id",
            found: selection.kind(),
        }),
        _ => Ok(()),
    }
}

#[derive(Default)]
struct Counts {
    filtered: Option<(u64, u64)>,
    unfiltered: Option<u64>,
}

/// Cached item counts of a query backed collection.
///
/// The filtered count is tied to the query revision it was taken under.
#[derive(Default)]
pub(crate) struct CountCache {
    counts: Mutex<Counts>,
}

impl CountCache {
    pub(crate) fn filtered(
        &self,
        params: &QueryParams,
        fetch: impl FnOnce(&EffectiveQuery) -> ServiceResult<u64>,
    ) -> Result<u64> {
        if !params.is_exec_query() {
            return Ok(0);
        }
        let revision = params.revision();
        if let Some((rev, n)) = self.counts.lock().filtered {
            if rev == revision {
                trace!(target: targets::COLLECTION, n, "count cache hit");
                return Ok(n);
            }
        }
        debug!(target: targets::COLLECTION, revision, "counting matching items");
        let n = fetch(&params.effective_query()).map_err(|e| {
            warn!(target: targets::COLLECTION, error = %e, "count failed");
            Error::Service(e)
        })?;
        self.counts.lock().filtered = Some((revision, n));
        Ok(n)
    }

    pub(crate) fn unfiltered(
        &self,
        params: &QueryParams,
        fetch: impl FnOnce(&EffectiveQuery) -> ServiceResult<u64>,
    ) -> Result<u64> {
        if !params.is_exec_query() {
            return Ok(0);
        }
        if let Some(n) = self.counts.lock().unfiltered {
            return Ok(n);
        }
        debug!(target: targets::COLLECTION, "counting all items");
        let n = fetch(&EffectiveQuery::default()).map_err(|e| {
            warn!(target: targets::COLLECTION, error = %e, "count failed");
            Error::Service(e)
        })?;
        self.counts.lock().unfiltered = Some(n);
        Ok(n)
    }

    pub(crate) fn clear(&self) {
        *self.counts.lock() = Counts::default();
    }
}
