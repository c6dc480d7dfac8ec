//! Lazy-loading controller over the hierarchical item cache.
//!
//! [`DataProviderController`] mediates between flat row indices (what a
//! virtualized viewport scrolls over) and the hierarchical, page-oriented
//! [`ItemCache`] tree. It issues page requests to the configured provider,
//! writes responses back into the cache, and publishes the page lifecycle
//! through three signals:
//!
//! - `page_requested` fires before the provider is invoked,
//! - `page_received` fires synchronously inside the provider's completion
//!   callback, after the cache has been updated,
//! - `page_loaded` is deferred through the shared [`UpdateQueue`], coalesced
//!   per (cache, page), so a burst of completions collapses into one
//!   consolidated pass when the host flushes.
//!
//! No internal lock is held while the provider function, a signal slot, or a
//! queued task runs, so all of those are free to call back into the
//! controller.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use trellis_core::{Signal, TaskKey, UpdateQueue};

use super::cache::{FlatIndexContext, ItemCache};
use super::provider::{
    CacheId, DataProviderFn, ExpandedFn, Filter, ItemKey, KeyFn, PageEvent, ProviderCallback,
    ProviderParams, SortOrder,
};
use crate::error::GridError;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on path re-resolution passes in
/// [`DataProviderController::resolve_flat_index_by_path`].
pub const MAX_PATH_RESOLVE_PASSES: usize = 10;

/// How long the root size may stay unestablished after the first request
/// before a warning is logged.
pub const SIZE_ESTABLISH_GRACE: Duration = Duration::from_secs(2);

struct Inner<T> {
    provider: Option<DataProviderFn<T>>,
    root: ItemCache<T>,
    page_size: usize,
    filters: Vec<Filter>,
    sort_orders: Vec<SortOrder>,
    key_fn: KeyFn<T>,
    expanded_fn: ExpandedFn<T>,
    size_established: bool,
    first_request_at: Option<Instant>,
    size_warned: bool,
}

impl<T: Clone> Inner<T> {
    fn recalculate(&mut self) -> usize {
        let key_fn = self.key_fn.clone();
        let expanded_fn = self.expanded_fn.clone();
        self.root.recalculate_size(&*key_fn, &*expanded_fn)
    }

    fn reset_caches(&mut self) {
        self.root.clear();
        self.recalculate();
    }

    /// One-shot warning when no response has established the root size
    /// within the grace period. Checked opportunistically on controller
    /// calls; there is no timer.
    fn check_size_grace(&mut self) {
        if self.size_established || self.size_warned {
            return;
        }
        let grace_elapsed = self
            .first_request_at
            .is_some_and(|at| at.elapsed() >= SIZE_ESTABLISH_GRACE);
        if grace_elapsed {
            self.size_warned = true;
            tracing::warn!(
                target: "trellis_grid::data",
                "data provider has not reported a size; the grid will stay empty until a \
                 response establishes one"
            );
        }
    }
}

/// Flat-index facade over a lazily loaded item hierarchy.
///
/// Cloning is cheap and yields a handle to the same controller.
pub struct DataProviderController<T> {
    inner: Arc<Mutex<Inner<T>>>,
    /// Fires before each page request is handed to the provider.
    pub page_requested: Arc<Signal<PageEvent>>,
    /// Fires synchronously when a page response has been written to the cache.
    pub page_received: Arc<Signal<PageEvent>>,
    /// Deferred, coalesced per (cache, page); fires when the host flushes the
    /// update queue.
    pub page_loaded: Arc<Signal<PageEvent>>,
    queue: Arc<UpdateQueue>,
}

impl<T> Clone for DataProviderController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            page_requested: self.page_requested.clone(),
            page_received: self.page_received.clone(),
            page_loaded: self.page_loaded.clone(),
            queue: self.queue.clone(),
        }
    }
}

fn page_task_id(cache: CacheId, page: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    (cache.0, page).hash(&mut hasher);
    hasher.finish()
}

impl<T: Clone + Send + 'static> DataProviderController<T> {
    /// Create a controller with no provider.
    ///
    /// `key_fn` extracts the stable identity used to key sub-caches;
    /// `expanded_fn` reports whether an item is currently expanded (backed by
    /// the grid's expansion state).
    pub fn new(key_fn: KeyFn<T>, expanded_fn: ExpandedFn<T>) -> Self {
        Self::with_queue(key_fn, expanded_fn, Arc::new(UpdateQueue::new()))
    }

    /// Create a controller sharing the host's update queue.
    pub fn with_queue(key_fn: KeyFn<T>, expanded_fn: ExpandedFn<T>, queue: Arc<UpdateQueue>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                provider: None,
                root: ItemCache::new(0),
                page_size: DEFAULT_PAGE_SIZE,
                filters: Vec::new(),
                sort_orders: Vec::new(),
                key_fn,
                expanded_fn,
                size_established: false,
                first_request_at: None,
                size_warned: false,
            })),
            page_requested: Arc::new(Signal::new()),
            page_received: Arc::new(Signal::new()),
            page_loaded: Arc::new(Signal::new()),
            queue,
        }
    }

    /// The update queue deferred `page_loaded` notifications go through.
    pub fn update_queue(&self) -> &Arc<UpdateQueue> {
        &self.queue
    }

    /// Replace the provider and discard everything loaded from the previous
    /// one. The size is unestablished again until a response reports one.
    pub fn set_data_provider(&self, provider: DataProviderFn<T>) {
        let mut inner = self.inner.lock();
        inner.provider = Some(provider);
        inner.root = ItemCache::new(0);
        inner.size_established = false;
        inner.first_request_at = None;
        inner.size_warned = false;
        inner.recalculate();
    }

    /// Set the page size. Clears all caches, since page boundaries shift.
    pub fn set_page_size(&self, page_size: usize) -> Result<(), GridError> {
        if page_size == 0 {
            return Err(GridError::InvalidPageSize);
        }
        let mut inner = self.inner.lock();
        inner.page_size = page_size;
        inner.reset_caches();
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.inner.lock().page_size
    }

    /// Replace the active sort keys. Clears all caches.
    pub fn set_sort_orders(&self, sort_orders: Vec<SortOrder>) {
        let mut inner = self.inner.lock();
        inner.sort_orders = sort_orders;
        inner.reset_caches();
    }

    pub fn sort_orders(&self) -> Vec<SortOrder> {
        self.inner.lock().sort_orders.clone()
    }

    /// Replace the active filters. Clears all caches.
    pub fn set_filters(&self, filters: Vec<Filter>) {
        let mut inner = self.inner.lock();
        inner.filters = filters;
        inner.reset_caches();
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.inner.lock().filters.clone()
    }

    /// Discard loaded pages and sub-caches while preserving known sizes.
    pub fn clear_cache(&self) {
        self.inner.lock().reset_caches();
    }

    /// Total visible row count across all expanded levels.
    pub fn flat_size(&self) -> usize {
        self.inner.lock().root.flat_size()
    }

    /// Known root-level item count.
    pub fn size(&self) -> usize {
        self.inner.lock().root.size()
    }

    /// Whether any response has established the root size yet.
    pub fn size_established(&self) -> bool {
        self.inner.lock().size_established
    }

    /// Whether any page request is outstanding anywhere in the cache tree.
    pub fn is_loading(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.check_size_grace();
        inner.root.any_pending()
    }

    /// Recompute the flat size after expansion state changed externally.
    pub fn recalculate_flat_size(&self) -> usize {
        self.inner.lock().recalculate()
    }

    /// Drop the sub-cache keyed by `key` (collapse) and recompute sizes.
    /// Returns `true` if a sub-cache existed.
    pub fn drop_sub_cache(&self, key: ItemKey) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.root.remove_sub_cache_deep(key);
        if removed {
            inner.recalculate();
        }
        removed
    }

    /// Resolve a flat index to its owning cache, depth and level-local index.
    ///
    /// Returns `None` only when `flat_index` is past the end. The item is
    /// `None` when its page is not loaded; resolving never triggers loading.
    pub fn get_flat_index_context(&self, flat_index: usize) -> Option<FlatIndexContext<T>> {
        let inner = self.inner.lock();
        if flat_index >= inner.root.flat_size() {
            return None;
        }
        Some(inner.root.context_at(flat_index, 0))
    }

    /// Request the page containing `flat_index` unless it is already loaded
    /// or already in flight.
    pub fn ensure_flat_index_loaded(&self, flat_index: usize) {
        let (cache, page, parent) = {
            let mut inner = self.inner.lock();
            inner.check_size_grace();
            if flat_index >= inner.root.flat_size() {
                return;
            }
            let context = inner.root.context_at(flat_index, 0);
            let page = context.index / inner.page_size;
            let parent = inner.root.parent_item_of(context.cache).cloned();
            (context.cache, page, parent)
        };
        self.request_page(cache, page, parent);
    }

    /// Create the sub-cache for the item at `flat_index` if it is loaded,
    /// expanded and has none yet, and request the sub-level's first page.
    /// One level deep; deeper levels follow as their parents load.
    pub fn ensure_flat_index_hierarchy(&self, flat_index: usize) {
        let created = {
            let mut inner = self.inner.lock();
            if flat_index >= inner.root.flat_size() {
                return;
            }
            let context = inner.root.context_at(flat_index, 0);
            let Some(item) = context.item else {
                return;
            };
            let key_fn = inner.key_fn.clone();
            let expanded_fn = inner.expanded_fn.clone();
            let Some(cache) = inner.root.find_cache_mut(context.cache) else {
                return;
            };
            let created = cache.ensure_sub_cache(context.index, &*key_fn, &*expanded_fn);
            if created.is_some() {
                inner.recalculate();
            }
            created.map(|(_, sub_id)| (sub_id, item))
        };
        if let Some((sub_id, item)) = created {
            self.request_page(sub_id, 0, Some(item));
        }
    }

    /// Compute the flat index addressed by per-level indices.
    ///
    /// `usize::MAX` means "last item at this level". Best-effort: where a
    /// level's data is not loaded yet, the path stops descending and the
    /// result points at the nearest resolvable ancestor.
    pub fn get_flat_index_by_path(&self, path: &[usize]) -> usize {
        self.inner.lock().root.flat_index_of_path(path)
    }

    /// Resolve a path while loading the data it crosses.
    ///
    /// Each pass computes the index, ensures the row and its sub-level are
    /// loading, and recomputes; it stops as soon as the index settles or
    /// after [`MAX_PATH_RESOLVE_PASSES`] passes, returning the last computed
    /// index either way. With an asynchronous provider intermediate passes
    /// see stale data and the caller re-resolves on `page_loaded`.
    pub fn resolve_flat_index_by_path(&self, path: &[usize]) -> usize {
        let mut index = self.get_flat_index_by_path(path);
        for pass in 0..MAX_PATH_RESOLVE_PASSES {
            self.ensure_flat_index_loaded(index);
            self.ensure_flat_index_hierarchy(index);
            let next = self.get_flat_index_by_path(path);
            if next == index {
                return index;
            }
            index = next;
            if pass + 1 == MAX_PATH_RESOLVE_PASSES {
                tracing::warn!(
                    target: "trellis_grid::data",
                    ?path,
                    passes = MAX_PATH_RESOLVE_PASSES,
                    "flat index did not settle while resolving path; returning last value"
                );
            }
        }
        index
    }

    /// Request the root level's first page.
    pub fn load_first_page(&self) -> Result<(), GridError> {
        let root = {
            let inner = self.inner.lock();
            if inner.provider.is_none() {
                return Err(GridError::NoDataProvider);
            }
            inner.root.id()
        };
        self.request_page(root, 0, None);
        Ok(())
    }

    /// Issue a page request for `cache` unless that page is loaded or
    /// already pending. The lock is released before `page_requested` fires
    /// and before the provider runs.
    fn request_page(&self, cache: CacheId, page: usize, parent_item: Option<T>) {
        let (provider, params) = {
            let mut inner = self.inner.lock();
            let Some(provider) = inner.provider.clone() else {
                return;
            };
            let page_size = inner.page_size;
            let Some(target) = inner.root.find_cache_mut(cache) else {
                return;
            };
            if target.is_page_loaded(page, page_size) || target.is_page_pending(page) {
                return;
            }
            target.mark_pending(page);
            if inner.first_request_at.is_none() {
                inner.first_request_at = Some(Instant::now());
            }
            let params = ProviderParams {
                page,
                page_size,
                filters: inner.filters.clone(),
                sort_orders: inner.sort_orders.clone(),
                parent_item,
            };
            (provider, params)
        };

        tracing::debug!(target: "trellis_grid::data", cache = cache.0, page, "requesting page");
        self.page_requested.emit(PageEvent { cache, page });

        let this = self.clone();
        let callback = ProviderCallback::new(move |items: Vec<T>, size: Option<usize>| {
            this.accept_page(cache, page, items, size);
        });
        provider(params, callback);
    }

    /// Write a page response back into the cache tree. Responses addressed
    /// to a generation that no longer exists are dropped silently.
    fn accept_page(&self, cache: CacheId, page: usize, items: Vec<T>, size: Option<usize>) {
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let is_root = inner.root.id() == cache;
            let page_size = inner.page_size;
            let Some(target) = inner.root.find_cache_mut(cache) else {
                tracing::debug!(
                    target: "trellis_grid::data",
                    cache = cache.0,
                    page,
                    "dropping response for stale cache generation"
                );
                return;
            };
            if let Some(size) = size {
                target.set_size(size);
                if is_root {
                    inner.size_established = true;
                }
            }
            target.set_page(page, page_size, items);
            inner.recalculate();
        }

        self.page_received.emit(PageEvent { cache, page });

        let loaded = self.page_loaded.clone();
        self.queue
            .schedule(TaskKey::new("page-loaded", page_task_id(cache, page)), move || {
                loaded.emit(PageEvent { cache, page });
            });
    }
}
