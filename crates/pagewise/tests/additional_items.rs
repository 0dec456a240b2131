//! The additional-items collection over the different base collections.

mod common;

use std::sync::Arc;

use common::{ids, people, person, PeopleService, Person};
use pagewise::prelude::*;

fn draft(id: u32) -> Person {
    Person {
        id: 1000 + id,
        name: format!("draft {id}"),
        age: 0,
    }
}

type Fixture = (Arc<PeopleService>, Arc<dyn PageableCollection<Person>>);

fn over_service(n: u32, page_size: usize) -> Fixture {
    let service = PeopleService::new(people(1..=n));
    let collection = CollectionBuilder::new(Backing::PageQuery(service.clone()))
        .config(
            CollectionConfig::default()
                .with_page_size(page_size)
                .with_select_mode(SelectMode::Multi),
        )
        .with_additional_items()
        .build()
        .unwrap();
    (service, collection)
}

#[test]
fn test_transient_items_start_a_new_page() {
    let (_, c) = over_service(10, 10);
    assert_eq!(ids(&c.items_on_page().unwrap()), (1..=10).collect::<Vec<_>>());
    assert_eq!(c.num_of_pages().unwrap(), 1);

    for i in 1..=3 {
        c.modification_handler().add_item(draft(i)).unwrap();
    }
    assert_eq!(ids(&c.items_on_page().unwrap()), (1..=10).collect::<Vec<_>>());
    assert_eq!(c.num_of_pages().unwrap(), 2);

    c.next_page().unwrap();
    assert_eq!(ids(&c.items_on_page().unwrap()), vec![1001, 1002, 1003]);
    assert_eq!(c.page_info().unwrap().to_string(), "Items 11 to 13 of 13");
}

#[test]
fn test_mixed_boundary_page() {
    let (service, c) = over_service(13, 10);
    for i in 1..=4 {
        c.modification_handler().add_item(draft(i)).unwrap();
    }
    c.set_page_idx(1).unwrap();
    assert_eq!(
        ids(&c.items_on_page().unwrap()),
        vec![11, 12, 13, 1001, 1002, 1003, 1004]
    );
    assert_eq!(service.calls("fetch_page"), 1);
}

#[test]
fn test_filter_applies_to_base_only() {
    let (_, c) = over_service(30, 10);
    c.modification_handler().add_item(draft(1)).unwrap();
    c.query_params()
        .set_filter(Some(FilterExpr::compare("id", CompareOp::Lt, 6)))
        .unwrap();
    assert_eq!(c.num_of_items().unwrap(), 6);
    assert_eq!(c.unfiltered_num_of_items().unwrap(), 31);
    assert_eq!(ids(&c.items_on_page().unwrap()), vec![1, 2, 3, 4, 5, 1001]);
}

#[test]
fn test_query_events_reach_wrapper_listeners() {
    let (_, c) = over_service(5, 10);
    let kinds = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = kinds.clone();
    c.notifier().connect(move |event| sink.lock().push(event.kind()));

    c.query_params()
        .set_sort_order(Some(SortOrder::desc("id")))
        .unwrap();
    assert_eq!(*kinds.lock(), vec![ChangeKind::Filter]);
}

#[test]
fn test_modifications_combine_base_and_transient() {
    let (service, c) = over_service(8, 10);
    let handler = c.modification_handler();
    handler.add_item(draft(1)).unwrap();
    handler.add_item(draft(2)).unwrap();
    handler.update_item(&person(4), true).unwrap();
    handler.update_item(&person(4), true).unwrap();

    let selection = c.selection_handler();
    selection.select_items(&[person(6), draft(2)], true).unwrap();
    assert!(handler.remove_selected_items().unwrap());

    let mods = c.modification_handler().modifications();
    assert!(mods.is_modified());
    assert_eq!(ids(mods.added_items()), vec![1001]);
    assert_eq!(ids(mods.updated_items()), vec![4]);
    assert_eq!(mods.removed_items().len(), 1);
    assert_eq!(mods.removed_items()[0].clicked_ids().ids, vec![6]);
    assert!(!service.stored_ids().contains(&6));

    handler.clear_registered_modifications().unwrap();
    assert!(!c.modification_handler().modifications().is_modified());
    assert_eq!(c.num_of_items().unwrap(), 7);
}
