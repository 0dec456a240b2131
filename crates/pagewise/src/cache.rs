//! Block cache for page query services.
//!
//! [`PageQueryCollectionCache`] answers "item at index `i`" for a
//! [`PageQueryService`] by loading aligned blocks of `block_size` items.
//! A block is loaded at most once until the effective query changes or the
//! cache is cleared. The cache notices query changes by comparing the
//! revision of its [`QueryParams`] with the revision its blocks were
//! loaded under.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::item::Item;
use crate::logging::targets;
use crate::query::QueryParams;
use crate::service::PageQueryService;

struct CacheState<T> {
    revision: u64,
    blocks: HashMap<u64, Arc<Vec<T>>>,
    recency: VecDeque<u64>,
    fetches: u64,
}

impl<T> CacheState<T> {
    fn reset(&mut self, revision: u64) {
        self.revision = revision;
        self.blocks.clear();
        self.recency.clear();
    }

    fn touch(&mut self, start: u64) {
        if let Some(pos) = self.recency.iter().position(|s| *s == start) {
            self.recency.remove(pos);
        }
        self.recency.push_back(start);
    }
}

/// Aligned block cache in front of a [`PageQueryService`].
///
/// # Example
///
/// ```ignore
/// let cache = PageQueryCollectionCache::new(service, params, 20);
/// let item = cache.get_at(57)?; // loads items 40..60 once
/// ```
pub struct PageQueryCollectionCache<T: Item> {
    service: Arc<dyn PageQueryService<T>>,
    params: Arc<QueryParams>,
    block_size: usize,
    max_blocks: Option<usize>,
    state: Mutex<CacheState<T>>,
}

impl<T: Item> PageQueryCollectionCache<T> {
    /// Create an unbounded cache.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(
        service: Arc<dyn PageQueryService<T>>,
        params: Arc<QueryParams>,
        block_size: usize,
    ) -> Self {
        assert!(block_size > 0, "block size must be at least 1");
        let revision = params.revision();
        Self {
            service,
            params,
            block_size,
            max_blocks: None,
            state: Mutex::new(CacheState {
                revision,
                blocks: HashMap::new(),
                recency: VecDeque::new(),
                fetches: 0,
            }),
        }
    }

    /// Keep at most `max_blocks` blocks, dropping the least recently used.
    pub fn with_max_blocks(mut self, max_blocks: Option<usize>) -> Self {
        self.max_blocks = max_blocks.map(|n| n.max(1));
        self
    }

    /// Number of items per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently held.
    pub fn cached_block_count(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Number of service calls made since creation.
    pub fn fetch_count(&self) -> u64 {
        self.state.lock().fetches
    }

    /// The item at `index` of the current query result.
    ///
    /// Returns `Ok(None)` past the end of the result and while query
    /// execution is switched off.
    pub fn get_at(&self, index: u64) -> Result<Option<T>> {
        if !self.params.is_exec_query() {
            return Ok(None);
        }
        let bs = self.block_size as u64;
        let start = (index / bs) * bs;
        let block = self.block(start)?;
        Ok(block.get((index - start) as usize).cloned())
    }

    /// Up to `len` items starting at `start`.
    pub fn get_range(&self, start: u64, len: usize) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(len);
        if !self.params.is_exec_query() || len == 0 {
            return Ok(out);
        }
        let bs = self.block_size as u64;
        let end = start + len as u64;
        let mut block_start = (start / bs) * bs;
        while block_start < end {
            let block = self.block(block_start)?;
            let from = start.saturating_sub(block_start) as usize;
            let to = ((end - block_start) as usize).min(block.len());
            if from < to {
                out.extend_from_slice(&block[from..to]);
            }
            if block.len() < self.block_size {
                break;
            }
            block_start += bs;
        }
        Ok(out)
    }

    /// Drop every cached block.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let revision = self.params.revision();
        state.reset(revision);
        debug!(target: targets::CACHE, "cache cleared");
    }

    #[tracing::instrument(
        skip_all,
        target = "pagewise::cache",
        level = "trace",
        fields(start = start)
    )]
    fn block(&self, start: u64) -> Result<Arc<Vec<T>>> {
        let mut state = self.state.lock();

        let revision = self.params.revision();
        if state.revision != revision {
            debug!(
                target: targets::CACHE,
                old = state.revision,
                new = revision,
                "query changed, dropping cached blocks"
            );
            state.reset(revision);
        }

        if let Some(block) = state.blocks.get(&start).cloned() {
            trace!(target: targets::CACHE, start, "block cache hit");
            state.touch(start);
            return Ok(block);
        }

        debug!(target: targets::CACHE, start, block_size = self.block_size, "fetching block");
        let query = self.params.effective_query();
        let items = self
            .service
            .fetch_page(&query, start, self.block_size)
            .map_err(|e| {
                warn!(target: targets::CACHE, start, error = %e, "block fetch failed");
                Error::Service(e)
            })?;
        state.fetches += 1;

        let block = Arc::new(items);
        state.blocks.insert(start, block.clone());
        state.touch(start);
        if let Some(max) = self.max_blocks {
            while state.blocks.len() > max {
                let Some(oldest) = state.recency.pop_front() else {
                    break;
                };
                state.blocks.remove(&oldest);
                trace!(target: targets::CACHE, start = oldest, "evicted block");
            }
        }
        Ok(block)
    }
}
