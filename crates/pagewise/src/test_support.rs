//! Fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::ServiceResult;
use crate::item::Identifiable;
use crate::query::{EffectiveQuery, ItemAttributes, QueryOptions, Value};
use crate::selection::ClickedIds;
use crate::service::{IdQueryService, PageQueryService, QueryService, ServiceHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct Bean {
    pub id: i64,
    pub name: String,
}

pub fn bean(id: i64, name: &str) -> Bean {
    Bean {
        id,
        name: name.to_string(),
    }
}

impl Identifiable for Bean {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

impl ItemAttributes for Bean {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }
}

/// Page and id query service over an in-memory store, counting calls.
pub struct FakeService {
    beans: RwLock<Vec<Bean>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_fetches: AtomicBool,
    fail_removal: AtomicBool,
}

impl FakeService {
    pub fn with_beans(n: i64) -> Arc<Self> {
        Self::with_items((1..=n).map(|i| bean(i, &format!("bean{i}"))).collect())
    }

    pub fn with_items(beans: Vec<Bean>) -> Arc<Self> {
        Arc::new(Self {
            beans: RwLock::new(beans),
            calls: Mutex::new(HashMap::new()),
            fail_fetches: AtomicBool::new(false),
            fail_removal: AtomicBool::new(false),
        })
    }

    pub fn page_handle(self: &Arc<Self>) -> ServiceHandle<Bean> {
        ServiceHandle::Page(self.clone())
    }

    pub fn id_handle(self: &Arc<Self>) -> ServiceHandle<Bean> {
        ServiceHandle::Id(self.clone())
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removal(&self, fail: bool) {
        self.fail_removal.store(fail, Ordering::SeqCst);
    }

    pub fn stored_ids(&self) -> Vec<i64> {
        self.beans.read().iter().map(|b| b.id).collect()
    }

    fn record(&self, method: &'static str) -> ServiceResult<()> {
        *self.calls.lock().entry(method).or_default() += 1;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(format!("{method} failed").into());
        }
        Ok(())
    }

    fn window(&self, query: &EffectiveQuery, start: u64, len: usize) -> Vec<Bean> {
        query
            .apply(self.beans.read().as_slice())
            .into_iter()
            .skip(start as usize)
            .take(len)
            .collect()
    }
}

impl QueryService<Bean> for FakeService {
    fn query_options(&self) -> QueryOptions {
        QueryOptions::permissive()
    }

    fn count_matching(&self, query: &EffectiveQuery) -> ServiceResult<u64> {
        self.record("count_matching")?;
        Ok(self.beans.read().iter().filter(|b| query.matches(*b)).count() as u64)
    }

    fn fetch_items_for_ids(&self, ids: &[i64]) -> ServiceResult<Vec<Bean>> {
        self.record("fetch_items_for_ids")?;
        Ok(self
            .beans
            .read()
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    fn remove_items(&self, query: &EffectiveQuery, ids: &ClickedIds<i64>) -> ServiceResult<()> {
        *self.calls.lock().entry("remove_items").or_default() += 1;
        if self.fail_removal.load(Ordering::SeqCst) {
            return Err("constraint violation".into());
        }
        let mut beans = self.beans.write();
        if ids.inverted {
            beans.retain(|b| !query.matches(b) || ids.ids.contains(&b.id));
        } else {
            beans.retain(|b| !ids.ids.contains(&b.id));
        }
        Ok(())
    }
}

impl PageQueryService<Bean> for FakeService {
    fn fetch_page(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<Bean>> {
        self.record("fetch_page")?;
        Ok(self.window(query, start, page_size))
    }
}

impl IdQueryService<Bean> for FakeService {
    fn fetch_ids(
        &self,
        query: &EffectiveQuery,
        start: u64,
        page_size: usize,
    ) -> ServiceResult<Vec<i64>> {
        self.record("fetch_ids")?;
        Ok(self.window(query, start, page_size).iter().map(|b| b.id).collect())
    }
}
