//! Commonly used types.
//!
//! ```
//! use pagewise::prelude::*;
//! ```

pub use crate::collection::{
    build_collection, AdditionalItemsCollection, Backing, CollectionBuilder, IdQueryCollection,
    InMemCollection, PageInfo, PageQueryCollection, PageableCollection,
};
pub use crate::config::{CollectionConfig, PageIndexPolicy, SingleModeCoercion};
pub use crate::error::{Error, Result, ServiceError, ServiceResult};
pub use crate::event::{ChangeEvent, ChangeKind, QueryEvent};
pub use crate::item::{Identifiable, Item};
pub use crate::modification::{ModificationHandler, Modifications};
pub use crate::query::{
    CompareOp, EffectiveQuery, FilterExpr, ItemAttributes, QueryOptions, QueryParams, SortOrder,
    Value,
};
pub use crate::selection::{ClickedIds, SelectMode, Selection, SelectionHandler};
pub use crate::service::{IdQueryService, PageQueryService, QueryService};
pub use pagewise_core::Veto;
