#![warn(missing_docs)]
//! # warehouse
//!
//! A caching and synchronization layer in front of a rate-limited,
//! eventually-consistent remote key-value store.
//!
//! - Reads and writes address **documents** by key, with in-memory caching.
//! - Concurrent loads of the same key are **coalesced**: one remote call,
//!   every caller observes the same value.
//! - Every write runs through a pluggable **validation pipeline** of
//!   transforms and guards.
//! - Cached writes commit back to the remote store through a **resilient,
//!   budget-aware retry** layer.
//! - An [`OrderedWarehouse`] maintains a bounded, value-sorted view over
//!   numeric documents, kept consistent with the primary cache through its
//!   update notifications.
//!
//! ```no_run
//! use warehouse::{UpdateSource, Warehouse};
//! use warehouse_memory::MemoryStore;
//!
//! # async fn example() -> Result<(), warehouse::WarehouseError> {
//! let cache = Warehouse::builder(MemoryStore::new())
//!     .template(0)
//!     .build();
//!
//! cache.set("player:42", 100, &UpdateSource::default())?;
//! cache.commit("player:42", false).await?;
//! # Ok(())
//! # }
//! ```

/// Error types for cache operations.
pub mod error;

/// The update validation pipeline: runtime-mutable transform and guard
/// chains.
pub mod pipeline;

/// The bounded, sorted secondary view over numeric documents.
pub mod ordered;

/// Named registry of active caches with create-or-get semantics.
pub mod registry;

/// The primary keyed document cache.
pub mod warehouse;

pub use error::WarehouseError;
pub use ordered::{OrderedWarehouse, OrderedWarehouseBuilder};
pub use pipeline::{GuardId, Pipeline, PipelineVerdict, TransformId};
pub use registry::{Registry, RegistryError};
pub use warehouse::{SetOutcome, Warehouse, WarehouseBuilder};

pub use warehouse_core::{
    Bound, Change, Document, DocKey, Guard, IntoDocKey, KeyError, NoopEvents, OrderedEntry,
    OrderedEvents, PageLimit, Raw, Scalar, SortOrder, Transform, UpdateSource, Verdict,
    WarehouseEvents,
};
pub use warehouse_remote::{
    BudgetGate, OpKind, RemoteError, RemoteStore, Retrier, RetryExhausted, UnlimitedBudget,
};

/// The `warehouse` prelude.
///
/// ```rust
/// use warehouse::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Document, DocKey, OrderedWarehouse, SetOutcome, UpdateSource, Warehouse, WarehouseError,
    };
}
