//! Page arithmetic and page state.

use std::fmt;

use pagewise_core::ChangeNotifier;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{CollectionConfig, PageIndexPolicy};
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;

/// Number of pages needed for `num_of_items` items. Always at least 1.
pub fn num_of_pages(num_of_items: u64, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    (num_of_items.div_ceil(page_size as u64) as usize).max(1)
}

/// Summary of the current page, e.g. for a pager label.
///
/// Item positions are 1-based; both are 0 for an empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_idx: usize,
    pub page_size: usize,
    pub num_of_pages: usize,
    pub num_of_items: u64,
    pub first_item: u64,
    pub last_item: u64,
}

impl PageInfo {
    /// Describe page `page_idx` of `num_of_items` items.
    pub fn new(page_idx: usize, page_size: usize, num_of_items: u64) -> Self {
        let num_of_pages = num_of_pages(num_of_items, page_size);
        let start = page_idx as u64 * page_size as u64;
        let (first_item, last_item) = if start < num_of_items {
            (start + 1, (start + page_size as u64).min(num_of_items))
        } else {
            (0, 0)
        };
        Self {
            page_idx,
            page_size,
            num_of_pages,
            num_of_items,
            first_item,
            last_item,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.page_idx == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.page_idx + 1 >= self.num_of_pages
    }
}

impl fmt::Display for PageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Items {} to {} of {}",
            self.first_item, self.last_item, self.num_of_items
        )
    }
}

struct PagingState {
    page_size: usize,
    page_idx: usize,
    synced_revision: Option<u64>,
}

/// Page size and page index of a collection.
///
/// The page index is re-validated lazily: whenever the query revision it
/// was last checked against differs, the next read clamps it to the new
/// page count.
pub(crate) struct Paging {
    state: Mutex<PagingState>,
    policy: PageIndexPolicy,
}

impl Paging {
    pub(crate) fn new(config: &CollectionConfig) -> Self {
        Self {
            state: Mutex::new(PagingState {
                page_size: config.page_size.max(1),
                page_idx: 0,
                synced_revision: None,
            }),
            policy: config.page_index_policy,
        }
    }

    pub(crate) fn page_size(&self) -> usize {
        self.state.lock().page_size
    }

    pub(crate) fn page_idx(&self) -> usize {
        self.state.lock().page_idx
    }

    /// Start index and length of the current page window.
    pub(crate) fn window(&self) -> (u64, usize) {
        let state = self.state.lock();
        (state.page_idx as u64 * state.page_size as u64, state.page_size)
    }

    /// Force a re-validation on the next [`sync`](Self::sync).
    pub(crate) fn invalidate(&self) {
        self.state.lock().synced_revision = None;
    }

    /// Clamp the page index if the query changed since the last check.
    pub(crate) fn sync<T: Item>(
        &self,
        revision: u64,
        notifier: &ChangeNotifier<ChangeEvent<T>>,
        count: impl FnOnce() -> Result<u64>,
    ) -> Result<()> {
        if self.state.lock().synced_revision == Some(revision) {
            return Ok(());
        }
        let num_of_items = count()?;
        self.clamp(num_of_items, notifier);
        self.state.lock().synced_revision = Some(revision);
        Ok(())
    }

    /// Move the page index into range without asking for permission.
    pub(crate) fn clamp<T: Item>(
        &self,
        num_of_items: u64,
        notifier: &ChangeNotifier<ChangeEvent<T>>,
    ) {
        let change = {
            let mut state = self.state.lock();
            let last = num_of_pages(num_of_items, state.page_size) - 1;
            if state.page_idx > last {
                let old = std::mem::replace(&mut state.page_idx, last);
                Some((old, last))
            } else {
                None
            }
        };
        if let Some((old, new)) = change {
            debug!(target: targets::COLLECTION, old, new, num_of_items, "page index clamped");
            notifier.notify(ChangeEvent::PageIdx { old, new });
        }
    }

    pub(crate) fn set_page_idx<T: Item>(
        &self,
        page_idx: usize,
        num_of_items: u64,
        notifier: &ChangeNotifier<ChangeEvent<T>>,
    ) -> Result<()> {
        let (old, pages) = {
            let state = self.state.lock();
            (state.page_idx, num_of_pages(num_of_items, state.page_size))
        };
        let new = if page_idx < pages {
            page_idx
        } else {
            match self.policy {
                PageIndexPolicy::Clamp => pages - 1,
                PageIndexPolicy::Reject => {
                    return Err(Error::PageOutOfRange {
                        requested: page_idx,
                        num_of_pages: pages,
                    });
                }
            }
        };
        if new == old {
            return Ok(());
        }

        let event = ChangeEvent::PageIdx { old, new };
        notifier.request(&event)?;
        self.state.lock().page_idx = new;
        debug!(target: targets::COLLECTION, old, new, "page index changed");
        notifier.notify(event);
        Ok(())
    }

    pub(crate) fn set_page_size<T: Item>(
        &self,
        page_size: usize,
        num_of_items: u64,
        notifier: &ChangeNotifier<ChangeEvent<T>>,
    ) -> Result<()> {
        if page_size == 0 {
            return Err(Error::invalid_argument("page size must be at least 1"));
        }
        let old = self.page_size();
        if old == page_size {
            return Ok(());
        }

        let event = ChangeEvent::PageSize {
            old,
            new: page_size,
        };
        notifier.request(&event)?;
        self.state.lock().page_size = page_size;
        debug!(target: targets::COLLECTION, old, new = page_size, "page size changed");
        notifier.notify(event);
        self.clamp(num_of_items, notifier);
        Ok(())
    }
}
