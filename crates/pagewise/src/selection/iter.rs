//! Lazy, block-wise iteration over selections.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{Error, Result};
use crate::item::Item;
use crate::logging::targets;

use super::{IdSelection, InvertedSelection, Selection};

/// Iterator over the items of a [`Selection`].
///
/// Explicit item selections are walked directly. Id selections and inverted
/// selections load `block_size` items per service call, only when the
/// previous block is used up. The first service failure is yielded as an
/// `Err` and ends the iteration.
pub struct SelectionIter<'a, T: Item> {
    state: State<'a, T>,
    block_size: usize,
}

enum State<'a, T: Item> {
    Items(std::slice::Iter<'a, T>),
    Ids {
        selection: &'a IdSelection<T>,
        pos: usize,
        block: VecDeque<T>,
    },
    AllExcept {
        selection: &'a InvertedSelection<T>,
        offset: u64,
        block: VecDeque<T>,
        exhausted: bool,
    },
    WithAdditional {
        base: Box<SelectionIter<'a, T>>,
        additional: std::slice::Iter<'a, T>,
    },
    Done,
}

impl<'a, T: Item> SelectionIter<'a, T> {
    pub(crate) fn new(selection: &'a Selection<T>, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let state = match selection {
            Selection::Items(s) => State::Items(s.items.iter()),
            Selection::Ids(s) => State::Ids {
                selection: s,
                pos: 0,
                block: VecDeque::new(),
            },
            Selection::AllExcept(s) => State::AllExcept {
                selection: s,
                offset: 0,
                block: VecDeque::new(),
                exhausted: false,
            },
            Selection::WithAdditional(s) => State::WithAdditional {
                base: Box::new(SelectionIter::new(&s.base, block_size)),
                additional: s.additional.items.iter(),
            },
        };
        Self { state, block_size }
    }
}

impl<T: Item> Iterator for SelectionIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let block_size = self.block_size;
        let outcome = match &mut self.state {
            State::Done => Ok(None),
            State::Items(iter) => Ok(iter.next().cloned()),
            State::WithAdditional { base, additional } => match base.next().transpose() {
                Ok(None) => Ok(additional.next().cloned()),
                other => other,
            },
            State::Ids {
                selection,
                pos,
                block,
            } => next_by_id(selection, pos, block, block_size),
            State::AllExcept {
                selection,
                offset,
                block,
                exhausted,
            } => next_inverted(selection, offset, block, exhausted, block_size),
        };
        match outcome {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

fn next_by_id<T: Item>(
    selection: &IdSelection<T>,
    pos: &mut usize,
    block: &mut VecDeque<T>,
    block_size: usize,
) -> Result<Option<T>> {
    let ids = &selection.ids.order;
    while block.is_empty() && *pos < ids.len() {
        let end = (*pos + block_size).min(ids.len());
        debug!(
            target: targets::SELECTION,
            start = *pos,
            len = end - *pos,
            "loading selected items by id"
        );
        let items = selection
            .service
            .fetch_items_for_ids(&ids[*pos..end])
            .map_err(Error::Service)?;
        block.extend(items);
        *pos = end;
    }
    Ok(block.pop_front())
}

fn next_inverted<T: Item>(
    selection: &InvertedSelection<T>,
    offset: &mut u64,
    block: &mut VecDeque<T>,
    exhausted: &mut bool,
    block_size: usize,
) -> Result<Option<T>> {
    while block.is_empty() && !*exhausted {
        debug!(
            target: targets::SELECTION,
            offset = *offset,
            block_size,
            "loading block of inverted selection"
        );
        let fetched = selection
            .service
            .fetch_range(&selection.query, *offset, block_size)
            .map_err(Error::Service)?;
        *offset += fetched.len() as u64;
        *exhausted = fetched.len() < block_size;
        let excluded = &selection.excluded.set;
        block.extend(
            fetched
                .into_iter()
                .filter(|item| !excluded.contains(&selection.service.id_of(item))),
        );
    }
    Ok(block.pop_front())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EffectiveQuery, FilterExpr};
    use crate::test_support::{bean, Bean, FakeService};

    fn ids(items: &[Bean]) -> Vec<i64> {
        items.iter().map(|b| b.id).collect()
    }

    #[test]
    fn test_items_iteration() {
        let sel = Selection::of_items([bean(5, "e"), bean(2, "b")]);
        assert_eq!(ids(&sel.to_vec(1).unwrap()), vec![5, 2]);
    }

    #[test]
    fn test_id_iteration_loads_in_blocks() {
        let service = FakeService::with_beans(10);
        let sel = Selection::of_ids(service.id_handle(), [9, 1, 5, 3, 7]);

        let mut iter = sel.iter(2);
        assert_eq!(iter.next().unwrap().unwrap().id, 9);
        assert_eq!(service.calls("fetch_items_for_ids"), 1);
        assert_eq!(iter.next().unwrap().unwrap().id, 1);
        assert_eq!(service.calls("fetch_items_for_ids"), 1);

        let rest: Vec<_> = iter.map(|r| r.unwrap().id).collect();
        assert_eq!(rest, vec![5, 3, 7]);
        assert_eq!(service.calls("fetch_items_for_ids"), 3);
    }

    #[test]
    fn test_inverted_iteration_skips_excluded() {
        let service = FakeService::with_beans(7);
        let sel =
            Selection::all_except(service.page_handle(), EffectiveQuery::default(), [2, 3, 6]);
        assert_eq!(ids(&sel.to_vec(2).unwrap()), vec![1, 4, 5, 7]);
    }

    #[test]
    fn test_inverted_iteration_respects_query() {
        let service = FakeService::with_beans(10);
        let query = EffectiveQuery {
            filter: Some(FilterExpr::compare("id", crate::query::CompareOp::Gt, 6)),
            sort_order: None,
        };
        let sel = Selection::all_except(service.id_handle(), query, [8]);
        assert_eq!(ids(&sel.to_vec(3).unwrap()), vec![7, 9, 10]);
        assert_eq!(sel.size().unwrap(), 3);
    }

    #[test]
    fn test_failure_ends_iteration() {
        let service = FakeService::with_beans(4);
        let sel = Selection::all_except(service.page_handle(), EffectiveQuery::default(), []);
        service.fail_fetches(true);

        let mut iter = sel.iter(2);
        assert!(iter.next().unwrap().unwrap_err().is_service_failure());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_additional_items_follow_base() {
        let service = FakeService::with_beans(3);
        let base = Selection::of_ids(service.page_handle(), [3]);
        let sel = Selection::with_additional(base, [bean(-1, "new")]);
        assert_eq!(ids(&sel.to_vec(10).unwrap()), vec![3, -1]);
    }
}
