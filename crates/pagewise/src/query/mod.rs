//! Query parameters, options and expressions.
//!
//! - [`QueryOptions`] declares what a collection can filter and sort on.
//! - [`QueryParams`] holds the current filter and sort order.
//! - [`EffectiveQuery`] is the resulting query handed to services.

mod filter;
mod options;
mod params;
mod sort;
mod value;

pub use filter::{CompareOp, FilterExpr};
pub use options::QueryOptions;
pub use params::{EffectiveQuery, QueryParams};
pub use sort::{SortDirection, SortKey, SortOrder};
pub use value::{ItemAttributes, Value};
