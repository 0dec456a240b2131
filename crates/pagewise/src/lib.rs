//! Pageable, query-backed collections.
//!
//! Pagewise presents a possibly very large set of items one page at a time.
//! Items may live in memory or behind a remote query service; either way a
//! collection offers the same [`PageableCollection`] interface:
//!
//! - **Query parameters**: a filter, a base filter and a sort order,
//!   validated against the [`QueryOptions`] a backing store declares
//! - **Paging**: page size, page index and page summaries
//! - **Selection**: single or multi selection of items, including
//!   inverted "everything except" selections that never load the items
//! - **Modifications**: added, updated and removed items, with removal
//!   going through the backing store
//!
//! Every change is offered to vetoable listeners before it is applied and
//! announced to listeners afterwards, through the collection's
//! [`ChangeNotifier`](pagewise_core::ChangeNotifier).
//!
//! # Example
//!
//! ```
//! use pagewise::prelude::*;
//!
//! #[derive(Clone, Debug)]
//! struct Task {
//!     id: u32,
//!     title: String,
//! }
//!
//! impl Identifiable for Task {
//!     type Id = u32;
//!     fn id(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! impl ItemAttributes for Task {
//!     fn attribute(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "id" => Some(self.id.into()),
//!             "title" => Some(self.title.as_str().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let tasks = (1..=42)
//!     .map(|id| Task { id, title: format!("task {id}") })
//!     .collect();
//! let config = CollectionConfig::default()
//!     .with_page_size(10)
//!     .with_select_mode(SelectMode::Multi);
//! let tasks = InMemCollection::new(tasks, config).unwrap();
//!
//! tasks
//!     .query_params()
//!     .set_filter(Some(FilterExpr::compare("id", CompareOp::Gt, 20)))
//!     .unwrap();
//! assert_eq!(tasks.num_of_items().unwrap(), 22);
//!
//! tasks.last_page().unwrap();
//! assert_eq!(tasks.page_info().unwrap().to_string(), "Items 21 to 22 of 22");
//! ```
//!
//! # Logging
//!
//! Pagewise logs through `tracing`; see [`logging`] for the targets.

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod item;
pub mod modification;
pub mod prelude;
pub mod query;
pub mod selection;
pub mod service;

#[cfg(test)]
mod test_support;

pub use pagewise_core::logging;
pub use pagewise_core::{ChangeNotifier, Veto};

pub use cache::PageQueryCollectionCache;
pub use collection::{
    build_collection, AdditionalItemsCollection, Backing, CollectionBuilder, IdQueryCollection,
    InMemCollection, PageInfo, PageQueryCollection, PageableCollection,
};
pub use config::{CollectionConfig, PageIndexPolicy, SingleModeCoercion};
pub use error::{Error, Result, ServiceError, ServiceResult};
pub use event::{ChangeEvent, ChangeKind, QueryEvent};
pub use item::{Identifiable, Item, ItemId};
pub use modification::{ModificationHandler, Modifications};
pub use selection::{ClickedIds, SelectMode, Selection, SelectionHandler};
pub use service::{IdQueryService, PageQueryService, QueryService, ServiceHandle};
