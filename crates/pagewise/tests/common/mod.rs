//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pagewise::prelude::*;
use parking_lot::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: u32,
    pub name: String,
    pub age: i64,
}

pub fn person(id: u32) -> Person {
    Person {
        id,
        name: format!("person {id}"),
        age: 20 + (id % 50) as i64,
    }
}

pub fn people(ids: impl IntoIterator<Item = u32>) -> Vec<Person> {
    ids.into_iter().map(person).collect()
}

impl Identifiable for Person {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }
}

impl ItemAttributes for Person {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(self.age.into()),
            _ => None,
        }
    }
}

pub fn ids(items: &[Person]) -> Vec<u32> {
    items.iter().map(|p| p.id).collect()
}

/// A page and id query service over a `Vec`, counting calls per method.
#[derive(Default)]
pub struct PeopleService {
    people: RwLock<Vec<Person>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_removal: Mutex<bool>,
}

impl PeopleService {
    pub fn new(people: Vec<Person>) -> Arc<Self> {
        Arc::new(Self {
            people: RwLock::new(people),
            ..Default::default()
        })
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn fail_removal(&self, fail: bool) {
        *self.fail_removal.lock() = fail;
    }

    pub fn stored_ids(&self) -> Vec<u32> {
        ids(&self.people.read())
    }

    fn count(&self, method: &'static str) {
        *self.calls.lock().entry(method).or_default() += 1;
    }

    fn matching(&self, query: &EffectiveQuery) -> Vec<Person> {
        query.apply(self.people.read().as_slice())
    }
}

impl QueryService<Person> for PeopleService {
    fn query_options(&self) -> QueryOptions {
        QueryOptions::new()
            .filterable("age", &[CompareOp::Eq, CompareOp::Lt, CompareOp::Ge])
            .filterable("name", &[CompareOp::Contains])
            .filterable("id", &[CompareOp::Eq, CompareOp::Gt, CompareOp::Lt])
            .sortable("id")
            .sortable("age")
            .with_default_sort_order(SortOrder::asc("id"))
    }

    fn count_matching(&self, query: &EffectiveQuery) -> ServiceResult<u64> {
        self.count("count_matching");
        Ok(self.matching(query).len() as u64)
    }

    fn fetch_items_for_ids(&self, ids: &[u32]) -> ServiceResult<Vec<Person>> {
        self.count("fetch_items_for_ids");
        let wanted: HashSet<_> = ids.iter().collect();
        // Reverse to check that callers restore the id order.
        Ok(self
            .people
            .read()
            .iter()
            .rev()
            .filter(|p| wanted.contains(&p.id))
            .cloned()
            .collect())
    }

    fn remove_items(&self, query: &EffectiveQuery, clicked: &ClickedIds<u32>) -> ServiceResult<()> {
        self.count("remove_items");
        if *self.fail_removal.lock() {
            return Err("storage offline".into());
        }
        let listed: HashSet<_> = clicked.ids.iter().copied().collect();
        let mut people = self.people.write();
        if clicked.is_selection_with_inverted_ids() {
            people.retain(|p| !query.matches(p) || listed.contains(&p.id));
        } else {
            people.retain(|p| !listed.contains(&p.id));
        }
        Ok(())
    }
}

impl PageQueryService<Person> for PeopleService {
    fn fetch_page(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<Person>> {
        self.count("fetch_page");
        Ok(self
            .matching(query)
            .into_iter()
            .skip(start as usize)
            .take(page_size)
            .collect())
    }
}

impl IdQueryService<Person> for PeopleService {
    fn fetch_ids(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<u32>> {
        self.count("fetch_ids");
        Ok(self
            .matching(query)
            .iter()
            .skip(start as usize)
            .take(page_size)
            .map(|p| p.id)
            .collect())
    }
}

/// Install a test subscriber once. Set `RUST_LOG` to see output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
