//! The bounded, sorted secondary view over numeric documents.
//!
//! [`OrderedWarehouse`] specializes a [`Warehouse`] holding numeric scalar
//! documents and maintains a bounded, value-sorted view (top-N) alongside
//! the primary cache. The view is populated by
//! [`load_first`](OrderedWarehouse::load_first) from the remote sorted-page
//! endpoint and kept consistent afterwards by observing the primary cache's
//! own update and delete notifications — no polling and no extra remote
//! fetches.
//!
//! For any key present in both, the view always carries the primary cache's
//! value: the primary cache is the authoritative in-memory source of truth,
//! so freshly fetched page entries lose to it during reconciliation.

use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};
use warehouse_core::{
    Document, DocKey, IntoDocKey, NoopEvents, OrderedEntry, OrderedEvents, PageLimit, SortOrder,
    UpdateSource, WarehouseEvents,
};
use warehouse_remote::{OpKind, RemoteStore, Retrier};

use crate::error::WarehouseError;
use crate::warehouse::{SetOutcome, Warehouse, WarehouseBuilder};

struct OrderedState {
    entries: Vec<OrderedEntry>,
    capacity: PageLimit,
    order: SortOrder,
}

impl Default for OrderedState {
    fn default() -> Self {
        OrderedState {
            entries: Vec::new(),
            capacity: PageLimit::DEFAULT,
            order: SortOrder::default(),
        }
    }
}

/// State shared between the ordered warehouse and its notification adapter.
struct OrderedCore {
    state: Mutex<OrderedState>,
    ordered_events: RwLock<Arc<dyn OrderedEvents>>,
    forward: RwLock<Arc<dyn WarehouseEvents>>,
}

impl OrderedCore {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, OrderedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ordered_events(&self) -> Arc<dyn OrderedEvents> {
        let events = self.ordered_events.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&events)
    }

    fn forward(&self) -> Arc<dyn WarehouseEvents> {
        let events = self.forward.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&events)
    }

    /// Incremental reconciliation after a primary cache update.
    ///
    /// Skipped when the update clearly cannot affect the bounded view: the
    /// key is absent, the view is full, and the new value does not beat the
    /// current boundary entry.
    fn apply_update(&self, key: &DocKey, value: f64) {
        let entries = {
            let mut state = self.lock_state();
            let capacity = state.capacity.get() as usize;
            let present = state.entries.iter().any(|e| e.key == *key);
            let full = state.entries.len() >= capacity;
            if !present && full {
                // The boundary entry is last: the minimum for descending
                // order, the maximum for ascending.
                let beats_boundary = state.entries.last().is_none_or(|edge| match state.order {
                    SortOrder::Descending => value > edge.value,
                    SortOrder::Ascending => value < edge.value,
                });
                if !beats_boundary {
                    trace!(%key, value, "update cannot affect the ordered view");
                    return;
                }
            }

            if let Some(entry) = state.entries.iter_mut().find(|e| e.key == *key) {
                entry.value = value;
            } else {
                state.entries.push(OrderedEntry::new(key.clone(), value));
            }
            let order = state.order;
            state.entries.sort_by(|a, b| order.compare(a, b));
            state.entries.truncate(capacity);
            state.entries.clone()
        };
        self.ordered_events().on_ordered_update(&entries);
    }

    /// Drops a key from the view after it left the primary cache or turned
    /// non-numeric.
    fn apply_remove(&self, key: &DocKey) {
        let entries = {
            let mut state = self.lock_state();
            let before = state.entries.len();
            state.entries.retain(|e| e.key != *key);
            if state.entries.len() == before {
                return;
            }
            state.entries.clone()
        };
        self.ordered_events().on_ordered_update(&entries);
    }
}

/// Event sink installed on the inner warehouse.
///
/// Forwards every notification to the user's sink, then reconciles the
/// ordered view. Reconciliation is purely in-memory and synchronous, so the
/// ordered-update notification still fires from within the triggering call.
struct OrderedAdapter {
    core: Arc<OrderedCore>,
}

impl WarehouseEvents for OrderedAdapter {
    fn on_update(&self, key: &DocKey, new: &Document, old: Option<&Document>) {
        self.core.forward().on_update(key, new, old);
        match new.as_f64() {
            Some(value) => self.core.apply_update(key, value),
            // A non-numeric value cannot stay in a value-sorted view.
            None => self.core.apply_remove(key),
        }
    }

    fn on_delete(&self, key: &DocKey, deleted: &Document) {
        self.core.forward().on_delete(key, deleted);
        self.core.apply_remove(key);
    }
}

/// A [`Warehouse`] of numeric documents with a bounded, sorted view.
pub struct OrderedWarehouse {
    warehouse: Warehouse,
    store: Arc<dyn RemoteStore>,
    retrier: Retrier,
    core: Arc<OrderedCore>,
}

impl std::fmt::Debug for OrderedWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedWarehouse")
            .field("warehouse", &self.warehouse)
            .field("entries", &self.entries())
            .finish()
    }
}

impl OrderedWarehouse {
    /// Creates a builder over the given remote store.
    pub fn builder(store: impl RemoteStore + 'static) -> OrderedWarehouseBuilder {
        OrderedWarehouseBuilder::new(store)
    }

    /// The underlying primary cache.
    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// The current ordered view.
    pub fn entries(&self) -> Vec<OrderedEntry> {
        self.core.lock_state().entries.clone()
    }

    /// Replaces the primary cache event sink (the ordered view keeps
    /// observing updates either way).
    pub fn set_events(&self, events: Arc<dyn WarehouseEvents>) {
        *self.core.forward.write().unwrap_or_else(|e| e.into_inner()) = events;
    }

    /// Replaces the ordered-update event sink.
    pub fn set_ordered_events(&self, events: Arc<dyn OrderedEvents>) {
        *self
            .core
            .ordered_events
            .write()
            .unwrap_or_else(|e| e.into_inner()) = events;
    }

    /// Rebuilds the ordered view from the remote sorted-page endpoint.
    ///
    /// Clears the current view, fetches the first `n` (clamped to 1..=100)
    /// sorted entries, merges them with the current primary cache (primary
    /// values win for shared keys; primary-only numeric keys join the
    /// candidate set), sorts with a deterministic tie-break (equal values
    /// order by key, ascending), truncates to `n`, and fires the
    /// ordered-update notification.
    ///
    /// The requested capacity and order become the view's last-used
    /// parameters for subsequent incremental reconciliation.
    pub async fn load_first(
        &self,
        n: usize,
        order: SortOrder,
    ) -> Result<Vec<OrderedEntry>, WarehouseError> {
        let capacity = PageLimit::clamped(n);
        {
            let mut state = self.core.lock_state();
            state.entries.clear();
            state.capacity = capacity;
            state.order = order;
        }

        let count = capacity.get() as usize;
        let page = self
            .retrier
            .invoke(OpKind::SortedPage, "sorted-page", || {
                self.store.sorted_page(order, count)
            })
            .await?;
        debug!(fetched = page.len(), count, ?order, "sorted page fetched");

        let mut candidates: Vec<OrderedEntry> = page
            .into_iter()
            .map(|(key, value)| OrderedEntry::new(key, value))
            .collect();
        // The primary cache is authoritative for any key it holds.
        for (key, doc) in self.warehouse.snapshot() {
            let Some(value) = doc.as_f64() else { continue };
            match candidates.iter_mut().find(|e| e.key == key) {
                Some(entry) => entry.value = value,
                None => candidates.push(OrderedEntry::new(key, value)),
            }
        }
        candidates.sort_by(|a, b| order.compare(a, b));
        candidates.truncate(count);

        {
            let mut state = self.core.lock_state();
            state.entries = candidates.clone();
        }
        self.core.ordered_events().on_ordered_update(&candidates);
        Ok(candidates)
    }

    /// See [`Warehouse::get`].
    pub async fn get(&self, key: impl IntoDocKey) -> Result<Option<Document>, WarehouseError> {
        self.warehouse.get(key).await
    }

    /// See [`Warehouse::set`].
    pub fn set(
        &self,
        key: impl IntoDocKey,
        new: impl Into<Document>,
        source: &UpdateSource,
    ) -> Result<SetOutcome, WarehouseError> {
        self.warehouse.set(key, new, source)
    }

    /// See [`Warehouse::commit`].
    pub async fn commit(&self, key: impl IntoDocKey, soft: bool) -> Result<(), WarehouseError> {
        self.warehouse.commit(key, soft).await
    }

    /// See [`Warehouse::release`].
    pub fn release(&self, key: impl IntoDocKey) -> Result<Option<Document>, WarehouseError> {
        self.warehouse.release(key)
    }

    /// See [`Warehouse::commit_all`].
    pub async fn commit_all(&self, soft: bool) -> Result<(), WarehouseError> {
        self.warehouse.commit_all(soft).await
    }

    /// See [`Warehouse::increment`].
    pub async fn increment(
        &self,
        key: impl IntoDocKey,
        amount: f64,
        source: &UpdateSource,
    ) -> Result<Option<Document>, WarehouseError> {
        self.warehouse.increment(key, amount, source).await
    }

    /// See [`Warehouse::decrement`].
    pub async fn decrement(
        &self,
        key: impl IntoDocKey,
        amount: f64,
        source: &UpdateSource,
    ) -> Result<Option<Document>, WarehouseError> {
        self.warehouse.decrement(key, amount, source).await
    }
}

/// Builder for [`OrderedWarehouse`].
pub struct OrderedWarehouseBuilder {
    inner: WarehouseBuilder,
    ordered_events: Arc<dyn OrderedEvents>,
}

impl OrderedWarehouseBuilder {
    /// Starts a builder over the given remote store.
    pub fn new(store: impl RemoteStore + 'static) -> Self {
        OrderedWarehouseBuilder {
            inner: WarehouseBuilder::new(store),
            ordered_events: Arc::new(NoopEvents),
        }
    }

    /// Sets the template for missing remote values (a numeric scalar).
    pub fn template(mut self, template: impl Into<Document>) -> Self {
        self.inner = self.inner.template(template);
        self
    }

    /// Sets the retrier wrapping all remote calls.
    pub fn retrier(mut self, retrier: Retrier) -> Self {
        self.inner = self.inner.retrier(retrier);
        self
    }

    /// Sets the event sink for primary cache mutations.
    pub fn events(mut self, events: Arc<dyn WarehouseEvents>) -> Self {
        self.inner = self.inner.events(events);
        self
    }

    /// Sets the event sink for ordered view reconciliations.
    pub fn ordered_events(mut self, events: Arc<dyn OrderedEvents>) -> Self {
        self.ordered_events = events;
        self
    }

    /// Builds the ordered warehouse.
    pub fn build(self) -> OrderedWarehouse {
        let (store, retrier, template, forward) = self.inner.into_parts();
        let core = Arc::new(OrderedCore {
            state: Mutex::new(OrderedState::default()),
            ordered_events: RwLock::new(self.ordered_events),
            forward: RwLock::new(forward),
        });
        let adapter = Arc::new(OrderedAdapter {
            core: Arc::clone(&core),
        });
        let warehouse =
            Warehouse::from_parts(Arc::clone(&store), retrier.clone(), template, adapter);
        OrderedWarehouse {
            warehouse,
            store,
            retrier,
            core,
        }
    }
}
