//! Integration tests for the bounded, sorted view: page loads, merges with
//! the primary cache, and incremental reconciliation via notifications.

use std::sync::{Arc, Mutex};

use warehouse::{
    Document, DocKey, OpKind, OrderedEntry, OrderedEvents, OrderedWarehouse, RemoteStore,
    SortOrder, UpdateSource, WarehouseEvents,
};
use warehouse_memory::MemoryStore;

fn key(raw: &str) -> DocKey {
    DocKey::normalize(raw).unwrap()
}

fn source() -> UpdateSource {
    UpdateSource::default()
}

fn pairs(entries: &[OrderedEntry]) -> Vec<(String, f64)> {
    entries
        .iter()
        .map(|e| (e.key.as_str().to_owned(), e.value))
        .collect()
}

/// Records every ordered-view sequence as it is published.
#[derive(Default)]
struct RecordingOrdered {
    sequences: Mutex<Vec<Vec<OrderedEntry>>>,
}

impl RecordingOrdered {
    fn sequences(&self) -> Vec<Vec<OrderedEntry>> {
        self.sequences.lock().unwrap().clone()
    }
}

impl OrderedEvents for RecordingOrdered {
    fn on_ordered_update(&self, entries: &[OrderedEntry]) {
        self.sequences.lock().unwrap().push(entries.to_vec());
    }
}

async fn persist(store: &MemoryStore, k: &str, doc: Document) {
    store
        .set(&key(k), doc.to_dormant().unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn load_then_reconcile_through_notifications() {
    let store = MemoryStore::new();
    let events = Arc::new(RecordingOrdered::default());
    let cache = OrderedWarehouse::builder(store.clone())
        .ordered_events(Arc::clone(&events) as Arc<dyn OrderedEvents>)
        .build();

    cache.set("A", 10, &source()).unwrap();
    cache.set("B", 100, &source()).unwrap();
    cache.set("C", 1, &source()).unwrap();

    let view = cache.load_first(3, SortOrder::Descending).await.unwrap();
    assert_eq!(
        pairs(&view),
        [
            ("B".to_owned(), 100.0),
            ("A".to_owned(), 10.0),
            ("C".to_owned(), 1.0)
        ]
    );
    assert_eq!(store.calls(OpKind::SortedPage), 1);

    // Reconciliation happens through the update notification, not a refetch.
    cache.set("A", 200, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [
            ("A".to_owned(), 200.0),
            ("B".to_owned(), 100.0),
            ("C".to_owned(), 1.0)
        ]
    );
    assert_eq!(store.calls(OpKind::SortedPage), 1);

    let sequences = events.sequences();
    assert_eq!(sequences.len(), 2);
    assert_eq!(pairs(sequences.last().unwrap()), pairs(&cache.entries()));
}

#[tokio::test]
async fn primary_cache_values_win_over_the_remote_page() {
    let store = MemoryStore::new();
    persist(&store, "A", Document::from(10)).await;
    persist(&store, "B", Document::from(100)).await;

    let cache = OrderedWarehouse::builder(store).build();
    // The primary cache disagrees about A and also holds a key the remote
    // page has never seen.
    cache.set("A", 999, &source()).unwrap();
    cache.set("D", 7, &source()).unwrap();

    let view = cache.load_first(10, SortOrder::Descending).await.unwrap();
    assert_eq!(
        pairs(&view),
        [
            ("A".to_owned(), 999.0),
            ("B".to_owned(), 100.0),
            ("D".to_owned(), 7.0)
        ]
    );
}

#[tokio::test]
async fn irrelevant_updates_do_not_disturb_a_full_view() {
    let store = MemoryStore::new();
    let events = Arc::new(RecordingOrdered::default());
    let cache = OrderedWarehouse::builder(store)
        .ordered_events(Arc::clone(&events) as Arc<dyn OrderedEvents>)
        .build();

    cache.set("A", 10, &source()).unwrap();
    cache.set("B", 100, &source()).unwrap();
    cache.load_first(2, SortOrder::Descending).await.unwrap();
    assert_eq!(events.sequences().len(), 1);

    // Too small to enter a full descending view: no reconciliation.
    cache.set("D", 5, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("B".to_owned(), 100.0), ("A".to_owned(), 10.0)]
    );
    assert_eq!(events.sequences().len(), 1);

    // Beats the boundary entry: displaces it.
    cache.set("E", 50, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("B".to_owned(), 100.0), ("E".to_owned(), 50.0)]
    );
    assert_eq!(events.sequences().len(), 2);
}

#[tokio::test]
async fn ascending_views_bound_from_above() {
    let cache = OrderedWarehouse::builder(MemoryStore::new()).build();
    cache.set("A", 10, &source()).unwrap();
    cache.set("B", 100, &source()).unwrap();
    cache.set("C", 1, &source()).unwrap();

    let view = cache.load_first(2, SortOrder::Ascending).await.unwrap();
    assert_eq!(
        pairs(&view),
        [("C".to_owned(), 1.0), ("A".to_owned(), 10.0)]
    );

    // Larger than the boundary entry: cannot enter an ascending view.
    cache.set("F", 100, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("C".to_owned(), 1.0), ("A".to_owned(), 10.0)]
    );

    cache.set("G", 0, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("G".to_owned(), 0.0), ("C".to_owned(), 1.0)]
    );
}

#[tokio::test]
async fn updating_a_present_key_resorts_in_place() {
    let cache = OrderedWarehouse::builder(MemoryStore::new()).build();
    cache.set("A", 10, &source()).unwrap();
    cache.set("B", 100, &source()).unwrap();
    cache.load_first(2, SortOrder::Descending).await.unwrap();

    // Lowering a present key's value is always relevant, even in a full view.
    cache.set("B", 1, &source()).unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("A".to_owned(), 10.0), ("B".to_owned(), 1.0)]
    );
}

#[tokio::test]
async fn removed_and_non_numeric_keys_leave_the_view() {
    let cache = OrderedWarehouse::builder(MemoryStore::new()).build();
    cache.set("A", 10, &source()).unwrap();
    cache.set("B", 100, &source()).unwrap();
    cache.set("C", 1, &source()).unwrap();
    cache.load_first(3, SortOrder::Descending).await.unwrap();

    cache.release("B").unwrap();
    assert_eq!(
        pairs(&cache.entries()),
        [("A".to_owned(), 10.0), ("C".to_owned(), 1.0)]
    );

    // A value-sorted view has no place for non-numeric documents.
    cache.set("A", "broken", &source()).unwrap();
    assert_eq!(pairs(&cache.entries()), [("C".to_owned(), 1.0)]);

    cache.commit("C", false).await.unwrap();
    assert!(cache.entries().is_empty());
}

#[tokio::test]
async fn requested_capacity_is_clamped() {
    let store = MemoryStore::new();
    persist(&store, "a", Document::from(1)).await;
    persist(&store, "b", Document::from(2)).await;
    persist(&store, "c", Document::from(3)).await;

    let cache = OrderedWarehouse::builder(store).build();

    // Zero clamps up to one.
    let view = cache.load_first(0, SortOrder::Descending).await.unwrap();
    assert_eq!(pairs(&view), [("c".to_owned(), 3.0)]);

    // Oversized requests clamp down to the endpoint maximum.
    let view = cache.load_first(5000, SortOrder::Descending).await.unwrap();
    assert_eq!(view.len(), 3);
}

#[tokio::test]
async fn primary_events_still_reach_the_configured_sink() {
    #[derive(Default)]
    struct CountingEvents {
        updates: Mutex<usize>,
    }

    impl WarehouseEvents for CountingEvents {
        fn on_update(&self, _key: &DocKey, _new: &Document, _old: Option<&Document>) {
            *self.updates.lock().unwrap() += 1;
        }
    }

    let events = Arc::new(CountingEvents::default());
    let cache = OrderedWarehouse::builder(MemoryStore::new())
        .events(Arc::clone(&events) as Arc<dyn WarehouseEvents>)
        .build();

    cache.set("A", 10, &source()).unwrap();
    cache.set("A", 20, &source()).unwrap();
    assert_eq!(*events.updates.lock().unwrap(), 2);
}
