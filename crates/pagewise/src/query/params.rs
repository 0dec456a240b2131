//! Mutable query state of a collection.

use std::sync::atomic::{AtomicU64, Ordering};

use pagewise_core::{ChangeNotifier, Property};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::event::QueryEvent;
use crate::logging::targets;

use super::filter::FilterExpr;
use super::options::QueryOptions;
use super::sort::SortOrder;
use super::value::ItemAttributes;

/// The filter and sort order a query actually runs with.
///
/// This is what collections hand to query services. Equality defines
/// "same query": caches stay valid exactly as long as it does not change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveQuery {
    pub filter: Option<FilterExpr>,
    pub sort_order: Option<SortOrder>,
}

impl EffectiveQuery {
    /// Returns `true` if `item` passes the filter.
    pub fn matches<T: ItemAttributes + ?Sized>(&self, item: &T) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(item))
    }

    /// Filter and stably sort `items`.
    pub fn apply<T: ItemAttributes + Clone>(&self, items: &[T]) -> Vec<T> {
        let mut out: Vec<T> = items.iter().filter(|i| self.matches(*i)).cloned().collect();
        if let Some(order) = &self.sort_order {
            order.sort(&mut out);
        }
        out
    }
}

/// Filter, sort order and execution switch of a collection.
///
/// The *effective filter* is the base filter combined with the user filter
/// using `And`. The *effective sort order* is the user sort order, or the
/// default sort order of the [`QueryOptions`] when none is set.
///
/// Every change of the effective query is offered to vetoable listeners
/// first, then applied, then announced. Each applied change increments the
/// [`revision`](Self::revision), which collections and caches compare to
/// decide whether their cached data is stale.
///
/// # Example
///
/// ```
/// use pagewise::query::{FilterExpr, QueryOptions, QueryParams, SortOrder};
///
/// let params = QueryParams::new(QueryOptions::permissive());
/// params.set_base_filter(Some(FilterExpr::equals("tenant", 7))).unwrap();
/// params.set_filter(Some(FilterExpr::equals("name", "Anna"))).unwrap();
///
/// let query = params.effective_query();
/// assert!(matches!(query.filter, Some(FilterExpr::And(ref parts)) if parts.len() == 2));
/// assert_eq!(params.revision(), 2);
/// ```
pub struct QueryParams {
    options: QueryOptions,
    base_filter: Property<Option<FilterExpr>>,
    filter: Property<Option<FilterExpr>>,
    sort_order: Property<Option<SortOrder>>,
    exec_query: Property<bool>,
    effective: Mutex<Option<EffectiveQuery>>,
    revision: AtomicU64,
    notifier: ChangeNotifier<QueryEvent>,
}

impl QueryParams {
    /// Create parameters without filters, using the options' default sort order.
    pub fn new(options: QueryOptions) -> Self {
        Self {
            options,
            base_filter: Property::new(None),
            filter: Property::new(None),
            sort_order: Property::new(None),
            exec_query: Property::new(true),
            effective: Mutex::new(None),
            revision: AtomicU64::new(0),
            notifier: ChangeNotifier::new(),
        }
    }

    /// The query options the parameters are validated against.
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Notifier for query parameter changes.
    pub fn notifier(&self) -> &ChangeNotifier<QueryEvent> {
        &self.notifier
    }

    /// Counter incremented on every applied change of the effective query.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// The user filter.
    pub fn filter(&self) -> Option<FilterExpr> {
        self.filter.get()
    }

    /// The context restriction combined with every user filter.
    pub fn base_filter(&self) -> Option<FilterExpr> {
        self.base_filter.get()
    }

    /// The user sort order.
    pub fn sort_order(&self) -> Option<SortOrder> {
        self.sort_order.get()
    }

    /// Returns `false` while query execution is switched off.
    pub fn is_exec_query(&self) -> bool {
        self.exec_query.get()
    }

    /// The filter queries run with.
    pub fn effective_filter(&self) -> Option<FilterExpr> {
        self.effective_query().filter
    }

    /// The sort order queries run with.
    pub fn effective_sort_order(&self) -> Option<SortOrder> {
        self.effective_query().sort_order
    }

    /// The effective filter and sort order.
    ///
    /// Computed lazily and cached until the next change.
    pub fn effective_query(&self) -> EffectiveQuery {
        let mut effective = self.effective.lock();
        effective
            .get_or_insert_with(|| EffectiveQuery {
                filter: self.compute_filter(self.base_filter.get(), self.filter.get()),
                sort_order: self.compute_sort_order(self.sort_order.get()),
            })
            .clone()
    }

    /// Set the user filter.
    ///
    /// Returns `Ok(false)` if the effective filter does not change. Fails
    /// with [`Error::NotFilterable`](crate::Error::NotFilterable) if the
    /// filter uses undeclared attributes or operators, and with
    /// [`Error::Vetoed`](crate::Error::Vetoed) if a listener refuses.
    #[tracing::instrument(skip_all, target = "pagewise::query", level = "trace")]
    pub fn set_filter(&self, filter: Option<FilterExpr>) -> Result<bool> {
        if let Some(f) = &filter {
            self.options.validate_filter(f)?;
        }
        let new = self.compute_filter(self.base_filter.get(), filter.clone());
        self.change_filter(new, || self.filter.set_silent(filter))
    }

    /// Set the base filter.
    ///
    /// The base filter is supplied by the surrounding context and is not
    /// validated against the query options.
    pub fn set_base_filter(&self, base_filter: Option<FilterExpr>) -> Result<bool> {
        let new = self.compute_filter(base_filter.clone(), self.filter.get());
        self.change_filter(new, || self.base_filter.set_silent(base_filter))
    }

    /// Set the user sort order. `None` falls back to the default sort order.
    #[tracing::instrument(skip_all, target = "pagewise::query", level = "trace")]
    pub fn set_sort_order(&self, order: Option<SortOrder>) -> Result<bool> {
        if let Some(o) = &order {
            self.options.validate_sort_order(o)?;
        }
        let old = self.effective_sort_order();
        let new = self.compute_sort_order(order.clone());
        if old == new {
            self.sort_order.set_silent(order);
            return Ok(false);
        }

        let event = QueryEvent::EffectiveSortOrder { old, new };
        self.notifier.request(&event)?;
        self.sort_order.set_silent(order);
        self.commit(event);
        Ok(true)
    }

    /// Drop the user sort order so the default sort order applies again.
    pub fn reset_sort_order(&self) -> Result<bool> {
        self.set_sort_order(None)
    }

    /// Switch query execution on or off.
    ///
    /// While switched off, collections report no items and do not call
    /// their services.
    pub fn set_exec_query(&self, exec: bool) -> Result<bool> {
        if self.exec_query.get() == exec {
            return Ok(false);
        }
        let event = QueryEvent::ExecQuery { exec };
        self.notifier.request(&event)?;
        self.exec_query.set_silent(exec);
        self.commit(event);
        Ok(true)
    }

    fn change_filter(&self, new: Option<FilterExpr>, apply: impl FnOnce()) -> Result<bool> {
        let old = self.effective_filter();
        if old == new {
            apply();
            return Ok(false);
        }

        let event = QueryEvent::EffectiveFilter { old, new };
        self.notifier.request(&event)?;
        apply();
        self.commit(event);
        Ok(true)
    }

    fn commit(&self, event: QueryEvent) {
        *self.effective.lock() = None;
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(target: targets::QUERY, revision, ?event, "query parameters changed");
        self.notifier.notify(event);
        trace!(target: targets::QUERY, revision, "query change delivered");
    }

    fn compute_filter(
        &self,
        base: Option<FilterExpr>,
        user: Option<FilterExpr>,
    ) -> Option<FilterExpr> {
        FilterExpr::combine(base.as_ref(), user.as_ref())
    }

    fn compute_sort_order(&self, user: Option<SortOrder>) -> Option<SortOrder> {
        user.or_else(|| self.options.default_sort_order().cloned())
    }
}

impl std::fmt::Debug for QueryParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParams")
            .field("effective", &self.effective_query())
            .field("exec_query", &self.is_exec_query())
            .field("revision", &self.revision())
            .finish()
    }
}

static_assertions::assert_impl_all!(QueryParams: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::query::CompareOp;
    use pagewise_core::Veto;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn options() -> QueryOptions {
        QueryOptions::new()
            .filterable("name", &[CompareOp::Eq])
            .sortable("name")
            .sortable("age")
            .with_default_sort_order(SortOrder::asc("name"))
    }

    #[test]
    fn test_default_sort_order_applies() {
        let params = QueryParams::new(options());
        assert_eq!(params.sort_order(), None);
        assert_eq!(params.effective_sort_order(), Some(SortOrder::asc("name")));

        assert!(params.set_sort_order(Some(SortOrder::desc("age"))).unwrap());
        assert_eq!(params.effective_sort_order(), Some(SortOrder::desc("age")));

        assert!(params.reset_sort_order().unwrap());
        assert_eq!(params.effective_sort_order(), Some(SortOrder::asc("name")));
    }

    #[test]
    fn test_same_effective_sort_is_silent() {
        let params = QueryParams::new(options());
        let events = Arc::new(Mutex::new(0));
        let e = events.clone();
        params.notifier().connect(move |_| *e.lock() += 1);

        assert!(!params.set_sort_order(Some(SortOrder::asc("name"))).unwrap());
        assert_eq!(*events.lock(), 0);
        assert_eq!(params.revision(), 0);
    }

    #[test]
    fn test_filter_validation() {
        let params = QueryParams::new(options());
        let err = params
            .set_filter(Some(FilterExpr::equals("age", 3)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFilterable { .. }));
        assert_eq!(params.filter(), None);

        // Base filters are context restrictions and skip validation.
        assert!(params.set_base_filter(Some(FilterExpr::equals("age", 3))).unwrap());
    }

    #[test]
    fn test_filter_change_bumps_revision_and_notifies() {
        let params = QueryParams::new(options());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        params.notifier().connect(move |e| s.lock().push(e.clone()));

        let filter = FilterExpr::equals("name", "x");
        assert!(params.set_filter(Some(filter.clone())).unwrap());
        assert!(!params.set_filter(Some(filter.clone())).unwrap());

        assert_eq!(params.revision(), 1);
        assert_eq!(
            *seen.lock(),
            vec![QueryEvent::EffectiveFilter {
                old: None,
                new: Some(filter)
            }]
        );
    }

    #[test]
    fn test_veto_leaves_state_unchanged() {
        let params = QueryParams::new(options());
        params
            .notifier()
            .connect_vetoable(|_| Err(Veto::new("unsaved changes")));

        let err = params
            .set_filter(Some(FilterExpr::equals("name", "x")))
            .unwrap_err();
        assert!(err.is_veto());
        assert_eq!(params.filter(), None);
        assert_eq!(params.effective_filter(), None);
        assert_eq!(params.revision(), 0);

        assert!(params.set_exec_query(false).unwrap_err().is_veto());
        assert!(params.is_exec_query());
    }

    #[test]
    fn test_exec_query_switch() {
        let params = QueryParams::new(options());
        assert!(params.set_exec_query(false).unwrap());
        assert!(!params.set_exec_query(false).unwrap());
        assert!(!params.is_exec_query());
        assert_eq!(params.revision(), 1);
    }

    #[test]
    fn test_effective_query_apply() {
        #[derive(Clone)]
        struct N(&'static str);
        impl ItemAttributes for N {
            fn attribute(&self, _: &str) -> Option<crate::query::Value> {
                Some(self.0.into())
            }
        }

        let query = EffectiveQuery {
            filter: Some(FilterExpr::compare("v", CompareOp::Ne, "b")),
            sort_order: Some(SortOrder::desc("v")),
        };
        let out = query.apply(&[N("a"), N("b"), N("c")]);
        let names: Vec<_> = out.iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["c", "a"]);
    }
}
