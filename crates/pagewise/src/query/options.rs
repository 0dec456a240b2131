//! Declared query capabilities of a collection.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::targets;

use super::filter::{CompareOp, FilterExpr};
use super::sort::SortOrder;

/// Which attributes a collection can filter and sort on.
///
/// Query options are fixed per collection. [`QueryParams`](super::QueryParams)
/// checks every filter and sort order against them before accepting it.
///
/// # Example
///
/// ```
/// use pagewise::query::{CompareOp, FilterExpr, QueryOptions, SortOrder};
///
/// let options = QueryOptions::new()
///     .filterable("name", &[CompareOp::Eq, CompareOp::Contains])
///     .sortable("name")
///     .with_default_sort_order(SortOrder::asc("name"));
///
/// assert!(options.validate_filter(&FilterExpr::equals("name", "Anna")).is_ok());
/// assert!(options.validate_sort_order(&SortOrder::asc("age")).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    filterable: HashMap<String, Vec<CompareOp>>,
    sortable: Vec<String>,
    default_sort_order: Option<SortOrder>,
    permissive: bool,
}

impl QueryOptions {
    /// Options that allow nothing until attributes are declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that accept every filter and sort order.
    ///
    /// Used by in-memory collections whose items answer any attribute.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    /// Declare `attribute` filterable with the given operators.
    pub fn filterable(mut self, attribute: impl Into<String>, ops: &[CompareOp]) -> Self {
        self.filterable
            .entry(attribute.into())
            .or_default()
            .extend_from_slice(ops);
        self
    }

    /// Declare `attribute` sortable.
    pub fn sortable(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        if !self.sortable.contains(&attribute) {
            self.sortable.push(attribute);
        }
        self
    }

    /// Set the order used when no user sort order is set.
    pub fn with_default_sort_order(mut self, order: SortOrder) -> Self {
        self.default_sort_order = Some(order);
        self
    }

    /// The order used when no user sort order is set.
    pub fn default_sort_order(&self) -> Option<&SortOrder> {
        self.default_sort_order.as_ref()
    }

    /// Returns `true` if `attribute` may be filtered with `op`.
    pub fn is_filterable(&self, attribute: &str, op: CompareOp) -> bool {
        self.permissive
            || self
                .filterable
                .get(attribute)
                .is_some_and(|ops| ops.contains(&op))
    }

    /// Returns `true` if `attribute` may be sorted on.
    pub fn is_sortable(&self, attribute: &str) -> bool {
        self.permissive || self.sortable.iter().any(|a| a == attribute)
    }

    /// The declared sortable attributes.
    pub fn sortable_attributes(&self) -> &[String] {
        &self.sortable
    }

    /// Check every condition of `filter`.
    pub fn validate_filter(&self, filter: &FilterExpr) -> Result<()> {
        for (attribute, op) in filter.conditions() {
            if !self.is_filterable(attribute, op) {
                debug!(target: targets::QUERY, attribute, ?op, "rejected filter condition");
                return Err(Error::NotFilterable {
                    attribute: attribute.to_string(),
                    op,
                });
            }
        }
        Ok(())
    }

    /// Check every key of `order`.
    pub fn validate_sort_order(&self, order: &SortOrder) -> Result<()> {
        for key in order.keys() {
            if !self.is_sortable(&key.attribute) {
                debug!(target: targets::QUERY, attribute = %key.attribute, "rejected sort key");
                return Err(Error::NotSortable {
                    attribute: key.attribute.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_filter_ops() {
        let options = QueryOptions::new().filterable("age", &[CompareOp::Lt, CompareOp::Gt]);
        assert!(options.is_filterable("age", CompareOp::Lt));
        assert!(!options.is_filterable("age", CompareOp::Eq));
        assert!(!options.is_filterable("name", CompareOp::Lt));

        let ok = FilterExpr::compare("age", CompareOp::Gt, 3).not();
        assert!(options.validate_filter(&ok).is_ok());

        let bad = FilterExpr::compare("age", CompareOp::Gt, 3).or(FilterExpr::equals("age", 1));
        let err = options.validate_filter(&bad).unwrap_err();
        assert!(matches!(err, Error::NotFilterable { op: CompareOp::Eq, .. }));
    }

    #[test]
    fn test_sortable() {
        let options = QueryOptions::new().sortable("name").sortable("name");
        assert_eq!(options.sortable_attributes().len(), 1);
        assert!(options.validate_sort_order(&SortOrder::desc("name")).is_ok());
        let err = options
            .validate_sort_order(&SortOrder::asc("name").then_asc("age"))
            .unwrap_err();
        assert!(matches!(err, Error::NotSortable { attribute } if attribute == "age"));
    }

    #[test]
    fn test_permissive() {
        let options = QueryOptions::permissive();
        assert!(options.is_filterable("anything", CompareOp::Contains));
        assert!(options.is_sortable("anything"));
        assert_eq!(options.default_sort_order(), None);
    }
}
