//! Error types for cache operations.

use thiserror::Error;
use warehouse_core::{DocKey, KeyError};
use warehouse_remote::RetryExhausted;

/// Error type for `Warehouse` operations.
///
/// Validation denials are deliberately absent: a denied update is a normal
/// negative outcome reported through
/// [`SetOutcome`](crate::SetOutcome), not an error.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Malformed or oversized key; raised before any remote access.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// A remote operation failed on every attempt within the retry budget.
    ///
    /// Fatal to the calling operation. Cache state is left as it was before
    /// the failed operation.
    #[error(transparent)]
    RetryExhausted(#[from] RetryExhausted),

    /// A document could not be encoded to, or decoded from, its wire shape.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// An increment/decrement targeted a non-numeric document.
    #[error("document at `{key}` is not numeric")]
    NotNumeric {
        /// Key of the offending document.
        key: DocKey,
    },
}
