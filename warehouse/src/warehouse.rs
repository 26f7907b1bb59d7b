//! The primary keyed document cache.
//!
//! [`Warehouse`] owns the in-memory document cache in front of a remote
//! key-value store and orchestrates the per-key lifecycle:
//!
//! - **load** (`get`) — remote fetch on cache miss, coalesced so at most one
//!   load per key is ever in flight; concurrent callers suspend and observe
//!   the same loaded value. Loaded values are reconciled against the
//!   configured template before entering the cache.
//! - **update** (`set`) — runs the proposed value through the validation
//!   [`Pipeline`], mutates the cache, and fires the update notification
//!   exactly once per effective change.
//! - **commit** — persists the cached value back to the remote store through
//!   the budget-aware [`Retrier`] and evicts the entry (unless soft).
//!
//! All remote traffic goes through the retrier; transient failures are
//! invisible to callers unless retries are exhausted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::Notify;
use tracing::{debug, trace};
use warehouse_core::{
    Document, DocKey, IntoDocKey, NoopEvents, UpdateSource, WarehouseEvents,
};
use warehouse_remote::{OpKind, RemoteStore, Retrier};

use crate::error::WarehouseError;
use crate::pipeline::{Pipeline, PipelineVerdict};

/// Outcome of a `set` call.
///
/// A denied or redundant update is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The cache was mutated and the update notification fired.
    Updated,
    /// The (transformed) value equals the current one; nothing happened.
    Unchanged,
    /// A guard denied the update; nothing happened.
    Denied,
}

#[derive(Default)]
struct State {
    entries: HashMap<DocKey, Document>,
    loading: HashSet<DocKey>,
    committing: HashSet<DocKey>,
}

/// The primary keyed document cache.
///
/// Shared state is guarded by a mutex with strictly non-awaiting critical
/// sections; suspension happens only while waiting for an in-flight load of
/// the same key or inside the retrier. Operations cannot be cancelled once
/// started — a load or commit runs to completion or fatal error.
///
/// `set` racing an in-flight `commit` of the same key is permitted and risks
/// a stale write on the next commit; no locking is provided for that pair.
pub struct Warehouse {
    store: Arc<dyn RemoteStore>,
    retrier: Retrier,
    template: Option<Document>,
    pipeline: Pipeline,
    state: Mutex<State>,
    loading_changed: Notify,
    events: RwLock<Arc<dyn WarehouseEvents>>,
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("store", &self.store.name())
            .field("retrier", &self.retrier)
            .field("template", &self.template)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Warehouse {
    /// Creates a builder over the given remote store.
    pub fn builder(store: impl RemoteStore + 'static) -> WarehouseBuilder {
        WarehouseBuilder::new(store)
    }

    pub(crate) fn from_parts(
        store: Arc<dyn RemoteStore>,
        retrier: Retrier,
        template: Option<Document>,
        events: Arc<dyn WarehouseEvents>,
    ) -> Warehouse {
        Warehouse {
            store,
            retrier,
            template,
            pipeline: Pipeline::new(),
            state: Mutex::new(State::default()),
            loading_changed: Notify::new(),
            events: RwLock::new(events),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn events(&self) -> Arc<dyn WarehouseEvents> {
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&events)
    }

    /// Replaces the event sink.
    pub fn set_events(&self, events: Arc<dyn WarehouseEvents>) {
        *self.events.write().unwrap_or_else(|e| e.into_inner()) = events;
    }

    /// The validation pipeline applied to every `set`.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the cached value, loading it from the remote store on a miss.
    ///
    /// At most one remote load per key is in flight at any time: callers
    /// racing an in-flight load suspend until it settles and then observe
    /// the cached value, without issuing a redundant remote call.
    ///
    /// Returns `None` only when the remote store has no value for the key
    /// and no template is configured; nothing is cached in that case.
    pub async fn get(&self, key: impl IntoDocKey) -> Result<Option<Document>, WarehouseError> {
        let key = key.into_doc_key()?;
        loop {
            let notified = self.loading_changed.notified();
            tokio::pin!(notified);
            {
                let mut state = self.lock_state();
                if let Some(doc) = state.entries.get(&key) {
                    trace!(%key, "cache hit");
                    return Ok(Some(doc.clone()));
                }
                if state.loading.insert(key.clone()) {
                    break;
                }
                // Someone else is loading this key: register for the wakeup
                // before releasing the lock so it cannot be missed.
                debug!(%key, "load in flight, coalescing");
                notified.as_mut().enable();
            }
            notified.await;
        }

        let loaded = self.load(&key).await;

        let mut state = self.lock_state();
        state.loading.remove(&key);
        self.loading_changed.notify_waiters();
        match loaded {
            Ok(Some(doc)) => {
                state.entries.insert(key.clone(), doc.clone());
                Ok(Some(doc))
            }
            Ok(None) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn load(&self, key: &DocKey) -> Result<Option<Document>, WarehouseError> {
        let label = format!("get:{key}");
        let raw = self
            .retrier
            .invoke(OpKind::Get, &label, || self.store.get(key))
            .await?;
        let loaded = match raw {
            Some(raw) => Some(Document::from_dormant(&raw)?),
            None => None,
        };
        if loaded.is_none() && self.template.is_some() {
            debug!(%key, "no remote value, using template");
        }
        Ok(Document::reconcile(self.template.as_ref(), loaded))
    }

    /// Proposes a new value for `key`.
    ///
    /// No-op when the proposed value equals the cached one. Otherwise the
    /// value runs through the pipeline; on allow, the cache entry is
    /// overwritten and the update notification fires synchronously, exactly
    /// once.
    pub fn set(
        &self,
        key: impl IntoDocKey,
        new: impl Into<Document>,
        source: &UpdateSource,
    ) -> Result<SetOutcome, WarehouseError> {
        let key = key.into_doc_key()?;
        let new = new.into();

        let old = self.lock_state().entries.get(&key).cloned();
        if old.as_ref() == Some(&new) {
            trace!(%key, "set is a no-op");
            return Ok(SetOutcome::Unchanged);
        }

        match self.pipeline.evaluate(&key, old.as_ref(), new, source) {
            PipelineVerdict::Deny => Ok(SetOutcome::Denied),
            PipelineVerdict::Allow(transformed) => {
                if old.as_ref() == Some(&transformed) {
                    trace!(%key, "transformed value unchanged");
                    return Ok(SetOutcome::Unchanged);
                }
                let previous = self
                    .lock_state()
                    .entries
                    .insert(key.clone(), transformed.clone());
                self.events().on_update(&key, &transformed, previous.as_ref());
                Ok(SetOutcome::Updated)
            }
        }
    }

    /// Persists the cached value for `key` back to the remote store.
    ///
    /// Silently does nothing when the key is not cached or a commit for it
    /// is already in flight (a racing commit attempt is dropped, not
    /// queued). On success the entry is evicted and the delete notification
    /// fires, unless `soft` — a soft commit persists without evicting. On
    /// retry exhaustion the entry is left intact so no data is lost.
    pub async fn commit(&self, key: impl IntoDocKey, soft: bool) -> Result<(), WarehouseError> {
        let key = key.into_doc_key()?;
        let doc = {
            let mut state = self.lock_state();
            let Some(doc) = state.entries.get(&key).cloned() else {
                trace!(%key, "commit of uncached key, skipping");
                return Ok(());
            };
            if !state.committing.insert(key.clone()) {
                trace!(%key, "commit already in flight, dropping");
                return Ok(());
            }
            doc
        };

        let result = self.persist(&key, &doc).await;

        // The committing marker clears on every path, including failure.
        let evicted = {
            let mut state = self.lock_state();
            state.committing.remove(&key);
            match (&result, soft) {
                (Ok(()), false) => state.entries.remove(&key),
                _ => None,
            }
        };
        if let Some(deleted) = evicted {
            self.events().on_delete(&key, &deleted);
        }
        result
    }

    async fn persist(&self, key: &DocKey, doc: &Document) -> Result<(), WarehouseError> {
        let raw = doc.to_dormant()?;
        let label = format!("set:{key}");
        self.retrier
            .invoke(OpKind::Set, &label, || self.store.set(key, raw.clone()))
            .await?;
        Ok(())
    }

    /// Drops the cache entry without persisting it.
    ///
    /// Used to discard speculative or invalid in-memory state. Fires the
    /// delete notification and returns the dropped value, if any.
    pub fn release(&self, key: impl IntoDocKey) -> Result<Option<Document>, WarehouseError> {
        let key = key.into_doc_key()?;
        let removed = self.lock_state().entries.remove(&key);
        if let Some(deleted) = &removed {
            debug!(%key, "released without persisting");
            self.events().on_delete(&key, deleted);
        }
        Ok(removed)
    }

    /// Commits every currently cached key independently.
    ///
    /// One key's failure does not prevent the other commits from running.
    /// Returns the first error after all commits have settled.
    pub async fn commit_all(&self, soft: bool) -> Result<(), WarehouseError> {
        for (_, result) in self.commit_all_detailed(soft).await {
            result?;
        }
        Ok(())
    }

    /// Like [`commit_all`](Warehouse::commit_all), but reports the outcome
    /// per key.
    pub async fn commit_all_detailed(
        &self,
        soft: bool,
    ) -> Vec<(DocKey, Result<(), WarehouseError>)> {
        let keys: Vec<DocKey> = self.lock_state().entries.keys().cloned().collect();
        let commits = keys.into_iter().map(|key| async move {
            let result = self.commit(key.clone(), soft).await;
            (key, result)
        });
        futures::future::join_all(commits).await
    }

    /// Adds `amount` to a numeric document through the normal get/set path.
    ///
    /// The update runs through the full validation pipeline — increments
    /// carry no bypass of guards or transforms. A key with neither a remote
    /// value nor a template increments from zero. Integer documents stay
    /// integers for fraction-free amounts.
    ///
    /// Returns the cached value after the operation (unchanged if a guard
    /// denied the update).
    pub async fn increment(
        &self,
        key: impl IntoDocKey,
        amount: f64,
        source: &UpdateSource,
    ) -> Result<Option<Document>, WarehouseError> {
        let key = key.into_doc_key()?;
        let current = self.get(key.clone()).await?;
        let new = match &current {
            None => int_preserving(0.0, amount),
            Some(doc) => match doc.as_f64() {
                Some(base) => match doc {
                    Document::Scalar(warehouse_core::Scalar::Int(_)) => {
                        int_preserving(base, amount)
                    }
                    _ => Document::from(base + amount),
                },
                None => return Err(WarehouseError::NotNumeric { key }),
            },
        };
        self.set(key.clone(), new, source)?;
        Ok(self.peek(&key))
    }

    /// Subtracts `amount` from a numeric document; see
    /// [`increment`](Warehouse::increment).
    pub async fn decrement(
        &self,
        key: impl IntoDocKey,
        amount: f64,
        source: &UpdateSource,
    ) -> Result<Option<Document>, WarehouseError> {
        self.increment(key, -amount, source).await
    }

    /// Returns the cached value without touching the remote store.
    pub fn peek(&self, key: &DocKey) -> Option<Document> {
        self.lock_state().entries.get(key).cloned()
    }

    /// Whether `key` is currently cached.
    pub fn contains(&self, key: &DocKey) -> bool {
        self.lock_state().entries.contains_key(key)
    }

    /// Currently cached keys, in no particular order.
    pub fn keys(&self) -> Vec<DocKey> {
        self.lock_state().entries.keys().cloned().collect()
    }

    /// A snapshot of the current cache contents.
    pub fn snapshot(&self) -> Vec<(DocKey, Document)> {
        self.lock_state()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }
}

fn int_preserving(base: f64, amount: f64) -> Document {
    if amount.fract() == 0.0 && base.fract() == 0.0 {
        Document::from(base as i64 + amount as i64)
    } else {
        Document::from(base + amount)
    }
}

/// Builder for [`Warehouse`].
pub struct WarehouseBuilder {
    store: Arc<dyn RemoteStore>,
    retrier: Retrier,
    template: Option<Document>,
    events: Arc<dyn WarehouseEvents>,
}

impl WarehouseBuilder {
    /// Starts a builder over the given remote store.
    pub fn new(store: impl RemoteStore + 'static) -> Self {
        WarehouseBuilder {
            store: Arc::new(store),
            retrier: Retrier::default(),
            template: None,
            events: Arc::new(NoopEvents),
        }
    }

    /// Sets the template used to fill in missing or absent remote data.
    pub fn template(mut self, template: impl Into<Document>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Sets the retrier wrapping all remote calls.
    pub fn retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// Sets the event sink notified of cache mutations.
    pub fn events(mut self, events: Arc<dyn WarehouseEvents>) -> Self {
        self.events = events;
        self
    }

    /// Builds the warehouse.
    pub fn build(self) -> Warehouse {
        let (store, retrier, template, events) = self.into_parts();
        Warehouse::from_parts(store, retrier, template, events)
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Arc<dyn RemoteStore>,
        Retrier,
        Option<Document>,
        Arc<dyn WarehouseEvents>,
    ) {
        (self.store, self.retrier, self.template, self.events)
    }
}
