//! Integration tests for the cache registry.

use std::sync::Arc;

use warehouse::{OrderedWarehouse, Registry, RegistryError, UpdateSource, Warehouse};
use warehouse_memory::MemoryStore;

fn plain() -> Warehouse {
    Warehouse::builder(MemoryStore::new()).build()
}

fn ordered() -> OrderedWarehouse {
    OrderedWarehouse::builder(MemoryStore::new()).build()
}

#[tokio::test]
async fn repeated_lookups_return_the_same_instance() {
    let registry = Registry::new();

    let first = registry.get_or_create("scores", plain).unwrap();
    first.set("k", 1, &UpdateSource::default()).unwrap();

    let second = registry.get_or_create("scores", plain).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.len(), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn names_are_normalized_like_keys() {
    let registry = Registry::new();

    let first = registry.get_or_create("scores", plain).unwrap();
    let second = registry.get_or_create("  scores ", plain).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    assert!(matches!(
        registry.get_or_create("", plain),
        Err(RegistryError::InvalidName(_))
    ));
}

#[tokio::test]
async fn kind_mismatch_is_an_error() {
    let registry = Registry::new();
    registry.get_or_create("scores", plain).unwrap();

    let err = registry
        .get_or_create_ordered("scores", ordered)
        .unwrap_err();
    assert!(matches!(err, RegistryError::KindMismatch { .. }));

    // The other direction fails the same way.
    registry.get_or_create_ordered("ladder", ordered).unwrap();
    assert!(matches!(
        registry.get_or_create("ladder", plain),
        Err(RegistryError::KindMismatch { .. })
    ));
}

#[tokio::test]
async fn removal_frees_the_name() {
    let registry = Registry::new();

    let first = registry.get_or_create("scores", plain).unwrap();
    assert!(registry.remove("scores").unwrap());
    assert!(!registry.contains("scores").unwrap());
    assert!(!registry.remove("scores").unwrap());

    // The old handle stays usable; the name can be re-bound, even to the
    // other kind.
    first.set("k", 1, &UpdateSource::default()).unwrap();
    registry.get_or_create_ordered("scores", ordered).unwrap();
}
