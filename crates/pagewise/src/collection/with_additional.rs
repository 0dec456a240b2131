//! A collection followed by transient items.

use std::sync::Arc;

use pagewise_core::ChangeNotifier;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::item::Item;
use crate::logging::targets;
use crate::modification::{ModificationHandler, Modifications};
use crate::query::QueryParams;
use crate::selection::{Selection, SelectionHandler, SelectionScope};

use super::{forward_query_events, request_removal, PageableCollection, Paging};

/// Shows the items of a base collection followed by transient items that
/// have been added but not stored yet.
///
/// The base items keep their page boundaries: page `p` shows the base's
/// page `p` while the base has items there. The remaining slots of the
/// last, partially filled base page are taken by the first transient items,
/// and later pages show transient items only. With a page size of 10, 13
/// base items and 12 transient items, page 1 holds 3 base items and 7
/// transient items and page 2 holds the remaining 5 transient items.
///
/// Query parameters are the base's. Transient items are not filtered.
pub struct AdditionalItemsCollection<T: Item> {
    base: Arc<dyn PageableCollection<T>>,
    additional: Arc<RwLock<Vec<T>>>,
    paging: Paging,
    selection: SelectionHandler<T>,
    notifier: Arc<ChangeNotifier<ChangeEvent<T>>>,
}

impl<T: Item> AdditionalItemsCollection<T> {
    /// Wrap `base`. The page size is taken from the base.
    pub fn new(base: Arc<dyn PageableCollection<T>>, config: CollectionConfig) -> Result<Self> {
        let config = config.with_page_size(base.page_size());
        config.validate()?;
        let notifier = Arc::new(ChangeNotifier::new());
        forward_query_events(base.query_params(), &notifier);

        let additional = Arc::new(RwLock::new(Vec::new()));
        let scope = SelectionScope::WithAdditional {
            base: base.clone(),
            additional: additional.clone(),
        };
        let selection = SelectionHandler::new(scope, notifier.clone(), &config);

        Ok(Self {
            base,
            additional,
            paging: Paging::new(&config),
            selection,
            notifier,
        })
    }

    /// The wrapped collection.
    pub fn base(&self) -> &Arc<dyn PageableCollection<T>> {
        &self.base
    }

    /// The transient items, in the order they were added.
    pub fn additional_items(&self) -> Vec<T> {
        self.additional.read().clone()
    }

    fn additional_len(&self) -> u64 {
        self.additional.read().len() as u64
    }

    fn is_additional(&self, item: &T) -> bool {
        let id = item.id();
        self.additional.read().iter().any(|a| a.id() == id)
    }

    fn sync(&self) -> Result<()> {
        if self.base.page_size() != self.paging.page_size() {
            self.base.set_page_size(self.paging.page_size())?;
        }
        self.paging
            .sync(self.base.query_params().revision(), &self.notifier, || {
                self.num_of_items()
            })
    }
}

impl<T: Item> PageableCollection<T> for AdditionalItemsCollection<T> {
    fn items_on_page(&self) -> Result<Vec<T>> {
        self.sync()?;
        let page_idx = self.paging.page_idx();
        let (start, page_size) = self.paging.window();
        let base_count = self.base.num_of_items()?;

        let mut items = Vec::with_capacity(page_size);
        if start < base_count {
            if self.base.page_idx() != page_idx {
                self.base.set_page_idx(page_idx)?;
            }
            items.extend(self.base.items_on_page()?);
        }

        let free = page_size.saturating_sub(items.len());
        if free > 0 {
            let offset = start.saturating_sub(base_count) as usize;
            let additional = self.additional.read();
            if offset < additional.len() {
                items.extend(additional[offset..].iter().take(free).cloned());
            }
        }
        Ok(items)
    }

    fn page_size(&self) -> usize {
        self.paging.page_size()
    }

    fn set_page_size(&self, page_size: usize) -> Result<()> {
        self.base.set_page_size(page_size)?;
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
        Ok(self.base.num_of_items()? + self.additional_len())
    }

    fn unfiltered_num_of_items(&self) -> Result<u64> {
        Ok(self.base.unfiltered_num_of_items()? + self.additional_len())
    }

    fn query_params(&self) -> &Arc<QueryParams> {
        self.base.query_params()
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
        self.base.clear_caches();
        self.paging.invalidate();
    }
}

impl<T: Item> ModificationHandler<T> for AdditionalItemsCollection<T> {
    /// Append `item` to the transient items, or replace the transient item
    /// with the same id.
    fn add_item(&self, item: T) -> Result<()> {
        let event = ChangeEvent::ItemAdded(item.clone());
        self.notifier.request(&event)?;
        {
            let id = item.id();
            let mut additional = self.additional.write();
            match additional.iter_mut().find(|a| a.id() == id) {
                Some(existing) => *existing = item,
                None => additional.push(item),
            }
        }
        debug!(
            target: targets::MODIFICATION,
            count = self.additional_len(),
            "transient item added"
        );
        self.paging.invalidate();
        self.notifier.notify(event);
        Ok(())
    }

    fn update_item(&self, item: &T, is_updated: bool) -> Result<()> {
        if !self.is_additional(item) {
            self.base.modification_handler().update_item(item, is_updated)?;
            self.selection.refresh_item(item);
            return Ok(());
        }
        let event = ChangeEvent::ItemUpdated {
            item: item.clone(),
            updated: is_updated,
        };
        self.notifier.request(&event)?;
        let id = item.id();
        if let Some(existing) = self.additional.write().iter_mut().find(|a| a.id() == id) {
            *existing = item.clone();
        }
        self.selection.refresh_item(item);
        self.notifier.notify(event);
        Ok(())
    }

    /// Remove an additional-items selection.
    ///
    /// The base part is removed through the base collection first. Transient
    /// items are only dropped once that succeeded.
    fn remove_items(&self, selection: &Selection<T>) -> Result<bool> {
        if !matches!(selection, Selection::WithAdditional(_)) {
            return Err(Error::SelectionMismatch {
                expected: "additional items",
                found: selection.kind(),
            });
        }
        let Some(event) = request_removal(&self.notifier, selection) else {
            return Ok(false);
        };

        let base_part = selection.base();
        if base_part.explicit_len() != Some(0)
            && !self.base.modification_handler().remove_items(base_part)?
        {
            debug!(target: targets::MODIFICATION, "base collection vetoed removal");
            return Ok(false);
        }

        let removed = selection.additional_items();
        if !removed.is_empty() {
            self.additional
                .write()
                .retain(|a| !removed.iter().any(|r| r.id() == a.id()));
            debug!(
                target: targets::MODIFICATION,
                count = removed.len(),
                "transient items removed"
            );
        }

        self.paging.invalidate();
        self.selection.clear_forced();
        self.notifier.notify(event);
        Ok(true)
    }

    fn remove_selected_items(&self) -> Result<bool> {
        self.remove_items(&self.selection.selection())
    }

    fn clear_registered_modifications(&self) -> Result<()> {
        let event = ChangeEvent::ModificationsCleared;
        self.notifier.request(&event)?;
        self.base.modification_handler().clear_registered_modifications()?;
        self.additional.write().clear();
        self.paging.invalidate();

        let current = self.selection.selection();
        if !current.additional_items().is_empty() {
            self.selection
                .force_selection(Selection::with_additional(current.base().clone(), []));
        }
        self.notifier.notify(event);
        Ok(())
    }

    fn modifications(&self) -> Modifications<T> {
        self.base.modification_handler().modifications().with_added(&self.additional.read())
    }
}
