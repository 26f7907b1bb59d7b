//! In-memory remote store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use warehouse_core::{Document, DocKey, OrderedEntry, Raw, SortOrder};
use warehouse_remote::{OpKind, RemoteError, RemoteResult, RemoteStore};

/// Per-kind call counters.
#[derive(Debug, Default)]
pub struct StoreCounters {
    get: AtomicUsize,
    set: AtomicUsize,
    remove: AtomicUsize,
    sorted_page: AtomicUsize,
}

impl StoreCounters {
    fn slot(&self, kind: OpKind) -> &AtomicUsize {
        match kind {
            OpKind::Get => &self.get,
            OpKind::Set => &self.set,
            OpKind::Remove => &self.remove,
            OpKind::SortedPage => &self.sorted_page,
        }
    }

    /// Number of calls of `kind` recorded so far.
    pub fn calls(&self, kind: OpKind) -> usize {
        self.slot(kind).load(Ordering::SeqCst)
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        for kind in OpKind::ALL {
            self.slot(kind).store(0, Ordering::SeqCst);
        }
    }
}

/// Pending fault injections, per operation kind.
#[derive(Debug, Default)]
struct FaultPlan {
    get: AtomicUsize,
    set: AtomicUsize,
    remove: AtomicUsize,
    sorted_page: AtomicUsize,
}

impl FaultPlan {
    fn slot(&self, kind: OpKind) -> &AtomicUsize {
        match kind {
            OpKind::Get => &self.get,
            OpKind::Set => &self.set,
            OpKind::Remove => &self.remove,
            OpKind::SortedPage => &self.sorted_page,
        }
    }

    /// Consumes one pending fault, if any remain.
    fn take(&self, kind: OpKind) -> bool {
        self.slot(kind)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// An in-memory [`RemoteStore`].
///
/// Stores dormant documents in a [`DashMap`] and serves sorted pages by
/// decoding stored values and keeping the numeric scalars. Useful as the
/// development store and as the instrumented store in tests: every call is
/// counted per [`OpKind`], and transient failures can be injected with
/// [`MemoryStore::fail_next`].
///
/// Clones share the same underlying map and counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<DocKey, Raw>>,
    counters: Arc<StoreCounters>,
    faults: Arc<FaultPlan>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of remote calls of `kind` made against this store.
    pub fn calls(&self, kind: OpKind) -> usize {
        self.counters.calls(kind)
    }

    /// Resets the per-kind call counters.
    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// Makes the next `n` calls of `kind` fail with a connection error.
    pub fn fail_next(&self, kind: OpKind, n: usize) {
        self.faults.slot(kind).fetch_add(n, Ordering::SeqCst);
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Direct (uncounted) read of the stored bytes, for assertions.
    pub fn raw(&self, key: &DocKey) -> Option<Raw> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    fn observe(&self, kind: OpKind) -> RemoteResult<()> {
        self.counters.slot(kind).fetch_add(1, Ordering::SeqCst);
        if self.faults.take(kind) {
            return Err(RemoteError::ConnectionError(Box::new(
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "injected failure"),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> RemoteResult<Option<Raw>> {
        self.observe(OpKind::Get)?;
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &DocKey, value: Raw) -> RemoteResult<()> {
        self.observe(OpKind::Set)?;
        self.data.insert(key.clone(), value);
        Ok(())
    }

    async fn remove(&self, key: &DocKey) -> RemoteResult<()> {
        self.observe(OpKind::Remove)?;
        self.data.remove(key);
        Ok(())
    }

    async fn sorted_page(
        &self,
        order: SortOrder,
        count: usize,
    ) -> RemoteResult<Vec<(DocKey, f64)>> {
        self.observe(OpKind::SortedPage)?;
        let mut entries = Vec::new();
        for item in self.data.iter() {
            // Non-numeric values simply don't participate in the sorted view.
            if let Ok(doc) = Document::from_dormant(item.value())
                && let Some(value) = doc.as_f64()
            {
                entries.push(OrderedEntry::new(item.key().clone(), value));
            }
        }
        entries.sort_by(|a, b| order.compare(a, b));
        entries.truncate(count);
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
