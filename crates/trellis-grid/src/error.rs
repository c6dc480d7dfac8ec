//! Error types for the grid crate.

use thiserror::Error;

/// Errors from grid configuration APIs.
///
/// These are the only fallible surfaces; data-path problems (stale responses,
/// out-of-range coordinates, unresolvable filter paths) are tolerated by
/// clamping or logged as warnings instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    /// Page size must be at least 1.
    #[error("page size must be greater than zero")]
    InvalidPageSize,
    /// An operation that loads data was called before a provider was set.
    #[error("no data provider has been set")]
    NoDataProvider,
}
