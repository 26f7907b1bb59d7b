//! Notification strategy interfaces.
//!
//! Consumers observe cache mutations through an explicit strategy object set
//! once at construction (or replaced via a setter) instead of loose optional
//! hook functions. All notifications fire synchronously from within the
//! triggering call, at most once per logical mutation:
//!
//! - `on_update(key, new, old)` — after a successful `set` mutated the cache;
//! - `on_delete(key, deleted)` — after a (hard) commit or release removed an
//!   entry;
//! - `on_ordered_update(entries)` — after the ordered view reconciled.
//!
//! The default implementation of every method is a no-op, so a sink only
//! implements the events it cares about. [`NoopEvents`] implements both
//! traits with all defaults.

use crate::document::Document;
use crate::key::DocKey;
use crate::ordered::OrderedEntry;

/// Observer of primary cache mutations.
pub trait WarehouseEvents: Send + Sync {
    /// A `set` replaced (or created) the cached value for `key`.
    fn on_update(&self, _key: &DocKey, _new: &Document, _old: Option<&Document>) {}

    /// A commit or release removed the cache entry for `key`.
    fn on_delete(&self, _key: &DocKey, _deleted: &Document) {}
}

/// Observer of the bounded ordered view.
pub trait OrderedEvents: Send + Sync {
    /// The ordered view reconciled; `entries` is the resulting sequence.
    fn on_ordered_update(&self, _entries: &[OrderedEntry]) {}
}

/// Event sink that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl WarehouseEvents for NoopEvents {}

impl OrderedEvents for NoopEvents {}
