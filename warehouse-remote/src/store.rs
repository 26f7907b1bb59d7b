//! The remote key-value store seam.

use std::sync::Arc;

use async_trait::async_trait;
use warehouse_core::{DocKey, Raw, SortOrder};

use crate::RemoteError;

/// Result alias for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// An opaque, eventually-consistent remote key-value service.
///
/// Values are dormant documents — whatever bytes the codec produced — and
/// are treated as opaque by everything except the sorted-page endpoint,
/// which must interpret stored values numerically.
///
/// Calls may fail transiently; callers are expected to wrap them in a
/// [`Retrier`](crate::Retrier) rather than handling transient failures
/// themselves.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the stored value for `key`, or `None` if absent.
    async fn get(&self, key: &DocKey) -> RemoteResult<Option<Raw>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &DocKey, value: Raw) -> RemoteResult<()>;

    /// Removes the value stored under `key`, if any.
    async fn remove(&self, key: &DocKey) -> RemoteResult<()>;

    /// Fetches the first `count` entries with numeric values, sorted.
    ///
    /// `count` is bounded to 1..=100 by the callers; implementations may
    /// return fewer entries than requested.
    async fn sorted_page(
        &self,
        order: SortOrder,
        count: usize,
    ) -> RemoteResult<Vec<(DocKey, f64)>>;

    /// Returns the name of this store for logging.
    fn name(&self) -> &str {
        "remote"
    }
}

#[async_trait]
impl RemoteStore for Arc<dyn RemoteStore> {
    async fn get(&self, key: &DocKey) -> RemoteResult<Option<Raw>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &DocKey, value: Raw) -> RemoteResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &DocKey) -> RemoteResult<()> {
        (**self).remove(key).await
    }

    async fn sorted_page(
        &self,
        order: SortOrder,
        count: usize,
    ) -> RemoteResult<Vec<(DocKey, f64)>> {
        (**self).sorted_page(order, count).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
