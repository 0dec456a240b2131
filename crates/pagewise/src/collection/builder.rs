//! Picks the collection strategy for a backing store.

use std::sync::Arc;

use tracing::debug;

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::item::Item;
use crate::logging::targets;
use crate::query::{ItemAttributes, QueryOptions};
use crate::service::{IdQueryService, PageQueryService};

use super::{
    AdditionalItemsCollection, IdQueryCollection, InMemCollection, PageQueryCollection,
    PageableCollection,
};

/// Where the items of a collection live.
pub enum Backing<T: Item> {
    /// Items held in memory. Created with [`Backing::in_memory`].
    InMemory(InMemoryItems<T>),
    /// A service that returns whole pages.
    PageQuery(Arc<dyn PageQueryService<T>>),
    /// A service that returns the ids of a page, then the items.
    IdQuery(Arc<dyn IdQueryService<T>>),
}

type BuildInMemory<T> = Box<
    dyn FnOnce(Option<QueryOptions>, CollectionConfig) -> Result<Arc<dyn PageableCollection<T>>>
        + Send,
>;

/// The items of an in-memory backing.
///
/// Only in-memory collections filter and sort items themselves, so only
/// they need [`ItemAttributes`]. The bound is checked when the backing is
/// created, which leaves service backed collections free of it.
pub struct InMemoryItems<T: Item> {
    len: usize,
    build: BuildInMemory<T>,
}

impl<T: Item> InMemoryItems<T> {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Item> Backing<T> {
    /// Items held in memory, filtered and sorted through [`ItemAttributes`].
    pub fn in_memory(items: Vec<T>) -> Self
    where
        T: ItemAttributes,
    {
        let len = items.len();
        let build: BuildInMemory<T> = Box::new(move |options, config| {
            let collection = match options {
                Some(options) => InMemCollection::with_options(items, options, config)?,
                None => InMemCollection::new(items, config)?,
            };
            Ok(Arc::new(collection) as Arc<dyn PageableCollection<T>>)
        });
        Self::InMemory(InMemoryItems { len, build })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in-memory",
            Self::PageQuery(_) => "page query",
            Self::IdQuery(_) => "id query",
        }
    }
}

/// Builds a [`PageableCollection`] for a [`Backing`].
///
/// # Example
///
/// ```
/// use pagewise::prelude::*;
///
/// # #[derive(Clone, Debug)]
/// # struct Row { id: u32 }
/// # impl Identifiable for Row {
/// #     type Id = u32;
/// #     fn id(&self) -> u32 { self.id }
/// # }
/// # impl ItemAttributes for Row {
/// #     fn attribute(&self, name: &str) -> Option<Value> {
/// #         (name == "id").then(|| self.id.into())
/// #     }
/// # }
/// let rows = (0..25).map(|id| Row { id }).collect();
/// let collection = CollectionBuilder::new(Backing::in_memory(rows))
///     .config(CollectionConfig::default().with_page_size(10))
///     .with_additional_items()
///     .build()
///     .unwrap();
/// assert_eq!(collection.num_of_pages().unwrap(), 3);
/// ```
pub struct CollectionBuilder<T: Item> {
    backing: Backing<T>,
    config: CollectionConfig,
    query_options: Option<QueryOptions>,
    additional_items: bool,
}

impl<T: Item> CollectionBuilder<T> {
    pub fn new(backing: Backing<T>) -> Self {
        Self {
            backing,
            config: CollectionConfig::default(),
            query_options: None,
            additional_items: false,
        }
    }

    pub fn config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Query capabilities of an in-memory collection. Service backed
    /// collections take them from the service.
    pub fn query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = Some(options);
        self
    }

    /// Wrap the collection in an [`AdditionalItemsCollection`].
    pub fn with_additional_items(mut self) -> Self {
        self.additional_items = true;
        self
    }

    pub fn build(self) -> Result<Arc<dyn PageableCollection<T>>> {
        debug!(
            target: targets::COLLECTION,
            backing = self.backing.name(),
            additional_items = self.additional_items,
            page_size = self.config.page_size,
            "building collection"
        );
        let config = self.config.clone();
        let collection: Arc<dyn PageableCollection<T>> = match self.backing {
            Backing::InMemory(items) => (items.build)(self.query_options, config)?,
            Backing::PageQuery(service) => Arc::new(PageQueryCollection::new(service, config)?),
            Backing::IdQuery(service) => Arc::new(IdQueryCollection::new(service, config)?),
        };
        if !self.additional_items {
            return Ok(collection);
        }
        Ok(Arc::new(AdditionalItemsCollection::new(
            collection,
            self.config,
        )?))
    }
}

/// Build a collection with default options.
pub fn build_collection<T: Item>(
    backing: Backing<T>,
    config: CollectionConfig,
) -> Result<Arc<dyn PageableCollection<T>>> {
    CollectionBuilder::new(backing).config(config).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bean, FakeService};

    #[test]
    fn test_builds_each_backing() {
        let service = FakeService::with_beans(7);
        let config = CollectionConfig::default().with_page_size(5);

        let in_memory =
            build_collection(Backing::in_memory(vec![bean(1, "a"), bean(2, "b")]), config.clone())
                .unwrap();
        assert_eq!(in_memory.num_of_items().unwrap(), 2);

        let paged = build_collection(Backing::PageQuery(service.clone()), config.clone()).unwrap();
        assert_eq!(paged.items_on_page().unwrap().len(), 5);

        let by_id = build_collection(Backing::IdQuery(service.clone()), config).unwrap();
        assert_eq!(by_id.num_of_pages().unwrap(), 2);
    }

    #[test]
    fn test_additional_items_wrapper() {
        let collection = CollectionBuilder::new(Backing::in_memory(vec![bean(1, "a")]))
            .with_additional_items()
            .build()
            .unwrap();
        collection.modification_handler().add_item(bean(-1, "new")).unwrap();
        assert_eq!(collection.num_of_items().unwrap(), 2);
        assert_eq!(collection.items_on_page().unwrap().len(), 2);
    }

    // Compiles without an `ItemAttributes` bound on `T`.
    fn page_query_backed<T: Item>(
        service: Arc<dyn PageQueryService<T>>,
    ) -> Result<Arc<dyn PageableCollection<T>>> {
        CollectionBuilder::new(Backing::PageQuery(service))
            .with_additional_items()
            .build()
    }

    #[test]
    fn test_service_backing_needs_no_attributes() {
        let collection =
            page_query_backed::<crate::test_support::Bean>(FakeService::with_beans(3)).unwrap();
        assert_eq!(collection.num_of_items().unwrap(), 3);
    }

    #[test]
    fn test_in_memory_backing_len() {
        let Backing::InMemory(items) = Backing::in_memory(vec![bean(1, "a")]) else {
            panic!("expected an in-memory backing");
        };
        assert_eq!(items.len(), 1);
        assert!(!items.is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = build_collection(
            Backing::<crate::test_support::Bean>::in_memory(Vec::new()),
            CollectionConfig::default().with_page_size(0),
        );
        assert!(result.is_err());
    }
}
