//! The data layer: provider contract, hierarchical page cache, lazy-loading
//! controller, in-memory adapter and sort/filter normalization.

pub mod array_provider;
mod cache;
mod controller;
mod provider;
pub mod sort_filter;

pub use cache::FlatIndexContext;
pub use controller::{
    DataProviderController, DEFAULT_PAGE_SIZE, MAX_PATH_RESOLVE_PASSES, SIZE_ESTABLISH_GRACE,
};
pub use provider::{
    CacheId, DataProviderFn, ExpandedFn, Filter, ItemKey, KeyFn, PageEvent, ProviderCallback,
    ProviderParams, SortDirection, SortOrder,
};
