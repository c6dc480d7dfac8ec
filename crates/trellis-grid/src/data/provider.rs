//! The data-provider contract.
//!
//! A data provider is a callback that supplies pages of items on demand. The
//! grid never sees the whole data set; it asks for one page at a time and the
//! provider answers through a single-use [`ProviderCallback`], either
//! synchronously (before the provider function returns, as the array-backed
//! adapter does) or on any later turn (a network-backed provider).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sort direction for a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest values first.
    Ascending,
    /// Largest values first.
    Descending,
}

/// One sort key: a dotted property path and a direction.
///
/// Sort orders are applied in sequence; the first key that distinguishes two
/// items wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    /// Dotted property path, e.g. `"name.last"`.
    pub path: String,
    /// Direction for this key.
    pub direction: SortDirection,
}

impl SortOrder {
    /// Create a sort order.
    pub fn new(path: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            path: path.into(),
            direction,
        }
    }
}

/// One filter criterion: items whose `path`-addressed value contains the
/// stringified `value` (case-insensitively) are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Dotted property path.
    pub path: String,
    /// The value to match; compared after stringification.
    pub value: Value,
}

impl Filter {
    /// Create a filter criterion.
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Parameters of a single page request.
#[derive(Clone)]
pub struct ProviderParams<T> {
    /// Zero-based page index.
    pub page: usize,
    /// Number of items per page.
    pub page_size: usize,
    /// Active filter criteria, in declaration order.
    pub filters: Vec<Filter>,
    /// Active sort keys, highest priority first.
    pub sort_orders: Vec<SortOrder>,
    /// The expanded parent item, present only for sub-level requests.
    pub parent_item: Option<T>,
}

/// Single-use completion handle for one page request.
///
/// The handle is consumed by [`complete`](Self::complete), so a provider
/// cannot answer the same request twice.
pub struct ProviderCallback<T> {
    deliver: Box<dyn FnOnce(Vec<T>, Option<usize>) + Send>,
}

impl<T> ProviderCallback<T> {
    pub(crate) fn new<F>(deliver: F) -> Self
    where
        F: FnOnce(Vec<T>, Option<usize>) + Send + 'static,
    {
        Self {
            deliver: Box::new(deliver),
        }
    }

    /// Deliver the requested page.
    ///
    /// `size`, when provided, sets or updates the total item count for the
    /// requested level (scoped to the sub-level when the request carried a
    /// `parent_item`).
    pub fn complete(self, items: Vec<T>, size: Option<usize>) {
        (self.deliver)(items, size);
    }
}

/// The data-provider callback type.
pub type DataProviderFn<T> = Arc<dyn Fn(ProviderParams<T>, ProviderCallback<T>) + Send + Sync>;

/// Stable identity of an item, used to key expansion, selection and
/// sub-cache ownership across re-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(pub u64);

impl ItemKey {
    /// Derive a key by hashing `value`.
    ///
    /// Hash the whole item for identity semantics, or a chosen sub-property
    /// for value-equality semantics (so a row re-fetched as a new value with
    /// the same id keeps its selection and expansion state).
    pub fn of<H: Hash + ?Sized>(value: &H) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Extracts the stable identity of an item.
pub type KeyFn<T> = Arc<dyn Fn(&T) -> ItemKey + Send + Sync>;

/// Reports whether an item is currently expanded.
pub type ExpandedFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Identifies one cache generation in the cache tree.
///
/// A fresh id is allocated whenever a cache is created or cleared, so a page
/// response addressed to a generation that no longer exists is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheId(pub(crate) u64);

/// Payload of the controller's page signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    /// The cache generation the page belongs to.
    pub cache: CacheId,
    /// Zero-based page index within that cache's level.
    pub page: usize,
}
