//! Integration tests for the primary cache: loads, coalescing, validation,
//! commits, and notifications.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use warehouse::{
    Change, Document, DocKey, OpKind, Raw, RemoteStore, Retrier, Scalar, SetOutcome, SortOrder,
    UpdateSource, Verdict, Warehouse, WarehouseError, WarehouseEvents,
};
use warehouse_memory::MemoryStore;
use warehouse_remote::RemoteResult;

fn key(raw: &str) -> DocKey {
    DocKey::normalize(raw).unwrap()
}

fn source() -> UpdateSource {
    UpdateSource::default()
}

/// Event sink recording every notification for assertions.
#[derive(Default)]
struct RecordingEvents {
    updates: Mutex<Vec<(DocKey, Document, Option<Document>)>>,
    deletes: Mutex<Vec<(DocKey, Document)>>,
}

impl RecordingEvents {
    fn updates(&self) -> Vec<(DocKey, Document, Option<Document>)> {
        self.updates.lock().unwrap().clone()
    }

    fn deletes(&self) -> Vec<(DocKey, Document)> {
        self.deletes.lock().unwrap().clone()
    }
}

impl WarehouseEvents for RecordingEvents {
    fn on_update(&self, key: &DocKey, new: &Document, old: Option<&Document>) {
        self.updates
            .lock()
            .unwrap()
            .push((key.clone(), new.clone(), old.cloned()));
    }

    fn on_delete(&self, key: &DocKey, deleted: &Document) {
        self.deletes.lock().unwrap().push((key.clone(), deleted.clone()));
    }
}

/// Store wrapper that delays every call, so concurrent loads actually race.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl RemoteStore for SlowStore {
    async fn get(&self, key: &DocKey) -> RemoteResult<Option<Raw>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &DocKey, value: Raw) -> RemoteResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &DocKey) -> RemoteResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(key).await
    }

    async fn sorted_page(
        &self,
        order: SortOrder,
        count: usize,
    ) -> RemoteResult<Vec<(DocKey, f64)>> {
        tokio::time::sleep(self.delay).await;
        self.inner.sorted_page(order, count).await
    }
}

async fn persist(store: &MemoryStore, k: &str, doc: Document) {
    store
        .set(&key(k), doc.to_dormant().unwrap())
        .await
        .unwrap();
    store.reset_counters();
}

#[tokio::test]
async fn get_returns_template_for_absent_key() {
    let cache = Warehouse::builder(MemoryStore::new()).template(7).build();
    let doc = cache.get("fresh").await.unwrap();
    assert_eq!(doc, Some(Document::from(7)));
}

#[tokio::test]
async fn get_without_template_or_remote_value_is_none() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();
    assert_eq!(cache.get("fresh").await.unwrap(), None);
    // Nothing was cached, so another get fetches again.
    cache.get("fresh").await.unwrap();
    assert_eq!(store.calls(OpKind::Get), 2);
}

#[tokio::test]
async fn structured_template_merges_with_loaded_value() {
    let store = MemoryStore::new();
    persist(&store, "p", Document::structured([("gold", 250.into())])).await;

    let template = Document::structured([("gold", 0.into()), ("level", 1.into())]);
    let cache = Warehouse::builder(store).template(template).build();

    let doc = cache.get("p").await.unwrap().unwrap();
    assert_eq!(doc.field("gold"), Some(&Scalar::Int(250)));
    assert_eq!(doc.field("level"), Some(&Scalar::Int(1)));
}

#[tokio::test]
async fn second_get_hits_the_cache() {
    let store = MemoryStore::new();
    persist(&store, "a", Document::from(1)).await;
    let cache = Warehouse::builder(store.clone()).build();

    cache.get("a").await.unwrap();
    cache.get("a").await.unwrap();
    assert_eq!(store.calls(OpKind::Get), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_gets_coalesce_into_one_remote_load() {
    let store = MemoryStore::new();
    persist(&store, "A", Document::from(42)).await;
    let cache = Warehouse::builder(SlowStore {
        inner: store.clone(),
        delay: Duration::from_millis(100),
    })
    .build();

    let (a, b, c) = tokio::join!(cache.get("A"), cache.get("A"), cache.get("A"));
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(a, Some(Document::from(42)));
    assert_eq!(store.calls(OpKind::Get), 1);
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let cache = Warehouse::builder(MemoryStore::new()).build();
    assert_eq!(
        cache.set("k", 5, &source()).unwrap(),
        SetOutcome::Updated
    );
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(5)));
}

#[tokio::test]
async fn identical_set_fires_one_notification() {
    let events = Arc::new(RecordingEvents::default());
    let cache = Warehouse::builder(MemoryStore::new())
        .events(Arc::clone(&events) as Arc<dyn WarehouseEvents>)
        .build();

    assert_eq!(cache.set("k", 5, &source()).unwrap(), SetOutcome::Updated);
    assert_eq!(cache.set("k", 5, &source()).unwrap(), SetOutcome::Unchanged);

    let updates = events.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, key("k"));
    assert_eq!(updates[0].1, Document::from(5));
    assert_eq!(updates[0].2, None);
}

#[tokio::test]
async fn denied_set_leaves_value_unchanged() {
    let cache = Warehouse::builder(MemoryStore::new()).build();
    cache.pipeline().add_guard(|c: &Change<'_>| {
        if c.new.as_f64().unwrap_or(0.0) < 0.0 {
            Verdict::Deny
        } else {
            Verdict::Allow
        }
    });

    cache.set("k", 5, &source()).unwrap();
    assert_eq!(cache.set("k", -5, &source()).unwrap(), SetOutcome::Denied);
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(5)));
}

#[tokio::test]
async fn transform_applies_before_caching() {
    let cache = Warehouse::builder(MemoryStore::new()).build();
    cache.pipeline().add_transform(|c: &Change<'_>| -> Document {
        Document::from(c.new.as_f64().unwrap_or(0.0).clamp(0.0, 100.0))
    });

    cache.set("k", 5000.0, &source()).unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(100.0)));
}

#[tokio::test]
async fn transform_that_restores_old_value_is_a_no_op() {
    let events = Arc::new(RecordingEvents::default());
    let cache = Warehouse::builder(MemoryStore::new())
        .events(Arc::clone(&events) as Arc<dyn WarehouseEvents>)
        .build();
    cache.set("k", 5, &source()).unwrap();

    // A vetoing transform: always proposes the old value.
    cache.pipeline().add_transform(|c: &Change<'_>| -> Document {
        c.old.cloned().unwrap_or_else(|| c.new.clone())
    });

    assert_eq!(cache.set("k", 9, &source()).unwrap(), SetOutcome::Unchanged);
    assert_eq!(events.updates().len(), 1);
}

#[tokio::test]
async fn commit_persists_and_evicts() {
    let store = MemoryStore::new();
    let events = Arc::new(RecordingEvents::default());
    let cache = Warehouse::builder(store.clone())
        .events(Arc::clone(&events) as Arc<dyn WarehouseEvents>)
        .build();

    cache.set("k", 5, &source()).unwrap();
    cache.commit("k", false).await.unwrap();

    assert!(!cache.contains(&key("k")));
    let raw = store.raw(&key("k")).unwrap();
    assert_eq!(Document::from_dormant(&raw).unwrap(), Document::from(5));
    assert_eq!(events.deletes().len(), 1);

    // The next get goes back to the remote store.
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(5)));
    assert_eq!(store.calls(OpKind::Get), 1);
}

#[tokio::test]
async fn soft_commit_keeps_the_entry() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();

    cache.set("k", 5, &source()).unwrap();
    cache.commit("k", true).await.unwrap();

    assert!(store.raw(&key("k")).is_some());
    assert!(cache.contains(&key("k")));
    // No remote fetch needed after a soft commit.
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(5)));
    assert_eq!(store.calls(OpKind::Get), 0);
}

#[tokio::test]
async fn commit_of_uncached_key_is_a_no_op() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();
    cache.commit("missing", false).await.unwrap();
    assert_eq!(store.calls(OpKind::Set), 0);
}

#[tokio::test]
async fn failed_commit_leaves_entry_intact() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();

    cache.set("k", 5, &source()).unwrap();
    store.fail_next(OpKind::Set, 5);
    let err = cache.commit("k", false).await.unwrap_err();
    assert!(matches!(err, WarehouseError::RetryExhausted(_)));
    assert_eq!(store.calls(OpKind::Set), 5);

    // The committing marker cleared, so a later commit goes through.
    assert!(cache.contains(&key("k")));
    cache.commit("k", false).await.unwrap();
    assert!(store.raw(&key("k")).is_some());
}

#[tokio::test]
async fn failed_load_clears_the_loading_marker() {
    let store = MemoryStore::new();
    persist(&store, "k", Document::from(3)).await;
    let cache = Warehouse::builder(store.clone()).build();

    store.fail_next(OpKind::Get, 5);
    let err = cache.get("k").await.unwrap_err();
    assert!(matches!(err, WarehouseError::RetryExhausted(_)));
    assert!(!cache.contains(&key("k")));

    // A fresh attempt on the same key is not blocked.
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(3)));
}

#[tokio::test]
async fn transient_failures_are_retried_invisibly() {
    let store = MemoryStore::new();
    persist(&store, "k", Document::from(3)).await;
    let cache = Warehouse::builder(store.clone()).build();

    store.fail_next(OpKind::Get, 4);
    assert_eq!(cache.get("k").await.unwrap(), Some(Document::from(3)));
    assert_eq!(store.calls(OpKind::Get), 5);
}

#[tokio::test]
async fn release_drops_without_persisting() {
    let store = MemoryStore::new();
    let events = Arc::new(RecordingEvents::default());
    let cache = Warehouse::builder(store.clone())
        .events(Arc::clone(&events) as Arc<dyn WarehouseEvents>)
        .build();

    cache.set("k", 5, &source()).unwrap();
    let dropped = cache.release("k").unwrap();
    assert_eq!(dropped, Some(Document::from(5)));
    assert!(store.raw(&key("k")).is_none());
    assert_eq!(events.deletes().len(), 1);

    // Releasing an uncached key fires nothing.
    assert_eq!(cache.release("k").unwrap(), None);
    assert_eq!(events.deletes().len(), 1);
}

#[tokio::test]
async fn commit_all_commits_every_key() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();

    for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
        cache.set(k, v, &source()).unwrap();
    }
    cache.commit_all(false).await.unwrap();

    assert!(cache.is_empty());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn commit_all_failure_does_not_stop_other_commits() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone())
        .retrier(Retrier::default().max_attempts(1))
        .build();

    for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
        cache.set(k, v, &source()).unwrap();
    }
    store.fail_next(OpKind::Set, 1);

    let results = cache.commit_all_detailed(false).await;
    let failures = results.iter().filter(|(_, r)| r.is_err()).count();
    assert_eq!(failures, 1);
    assert_eq!(store.len(), 2);
    assert_eq!(cache.len(), 1);

    assert!(cache.commit_all(false).await.is_ok());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn increment_goes_through_the_pipeline() {
    let cache = Warehouse::builder(MemoryStore::new()).template(10).build();
    cache.pipeline().add_guard(|c: &Change<'_>| {
        if c.new.as_f64().unwrap_or(0.0) > 100.0 {
            Verdict::Deny
        } else {
            Verdict::Allow
        }
    });

    let doc = cache.increment("k", 5.0, &source()).await.unwrap();
    assert_eq!(doc, Some(Document::from(15)));

    // A denied increment leaves the value unchanged.
    let doc = cache.increment("k", 1000.0, &source()).await.unwrap();
    assert_eq!(doc, Some(Document::from(15)));

    let doc = cache.decrement("k", 20.0, &source()).await.unwrap();
    assert_eq!(doc, Some(Document::from(-5)));
}

#[tokio::test]
async fn increment_of_non_numeric_document_fails() {
    let cache = Warehouse::builder(MemoryStore::new()).build();
    cache.set("k", "text", &source()).unwrap();
    let err = cache.increment("k", 1.0, &source()).await.unwrap_err();
    assert!(matches!(err, WarehouseError::NotNumeric { .. }));
}

#[tokio::test]
async fn increment_without_template_starts_from_zero() {
    let cache = Warehouse::builder(MemoryStore::new()).build();
    let doc = cache.increment("k", 3.0, &source()).await.unwrap();
    assert_eq!(doc, Some(Document::from(3)));
}

#[tokio::test]
async fn invalid_keys_are_rejected_before_remote_access() {
    let store = MemoryStore::new();
    let cache = Warehouse::builder(store.clone()).build();

    assert!(matches!(
        cache.get("").await.unwrap_err(),
        WarehouseError::InvalidKey(_)
    ));
    let oversized = "k".repeat(64);
    assert!(matches!(
        cache.get(oversized.as_str()).await.unwrap_err(),
        WarehouseError::InvalidKey(_)
    ));
    assert_eq!(store.calls(OpKind::Get), 0);
}
