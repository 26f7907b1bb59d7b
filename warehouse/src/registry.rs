//! Named registry of active caches.
//!
//! An explicit object with create-or-get semantics, owned by whatever
//! composes the process — deliberately not a module-level singleton. Names
//! follow the same normalization rules as document keys, and a name already
//! bound to the other cache kind is a hard error rather than a silent
//! shadow.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;
use warehouse_core::{DocKey, KeyError};

use crate::ordered::OrderedWarehouse;
use crate::warehouse::Warehouse;

/// Error type for registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed or oversized cache name.
    #[error(transparent)]
    InvalidName(#[from] KeyError),

    /// The name is already bound to a different cache kind.
    #[error("cache `{name}` is already registered with a different kind")]
    KindMismatch {
        /// The colliding name.
        name: SmolStr,
    },
}

/// A registered cache instance.
#[derive(Clone)]
enum RegisteredCache {
    Plain(Arc<Warehouse>),
    Ordered(Arc<OrderedWarehouse>),
}

/// Registry mapping names to live cache instances.
///
/// Lookups are create-or-get: the init closure runs only when the name is
/// not yet registered, and every later call with the same name returns the
/// same instance.
#[derive(Default)]
pub struct Registry {
    caches: DashMap<SmolStr, RegisteredCache>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("caches", &self.caches.len())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    fn canonical(name: &str) -> Result<SmolStr, RegistryError> {
        // Cache names obey the same constraints as document keys.
        let key = DocKey::normalize(name)?;
        Ok(SmolStr::new(key.as_str()))
    }

    /// Returns the plain warehouse registered under `name`, creating it with
    /// `init` when absent.
    pub fn get_or_create(
        &self,
        name: &str,
        init: impl FnOnce() -> Warehouse,
    ) -> Result<Arc<Warehouse>, RegistryError> {
        let name = Self::canonical(name)?;
        match self.caches.entry(name.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                RegisteredCache::Plain(warehouse) => Ok(Arc::clone(warehouse)),
                RegisteredCache::Ordered(_) => Err(RegistryError::KindMismatch { name }),
            },
            Entry::Vacant(vacant) => {
                let warehouse = Arc::new(init());
                vacant.insert(RegisteredCache::Plain(Arc::clone(&warehouse)));
                Ok(warehouse)
            }
        }
    }

    /// Returns the ordered warehouse registered under `name`, creating it
    /// with `init` when absent.
    pub fn get_or_create_ordered(
        &self,
        name: &str,
        init: impl FnOnce() -> OrderedWarehouse,
    ) -> Result<Arc<OrderedWarehouse>, RegistryError> {
        let name = Self::canonical(name)?;
        match self.caches.entry(name.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                RegisteredCache::Ordered(ordered) => Ok(Arc::clone(ordered)),
                RegisteredCache::Plain(_) => Err(RegistryError::KindMismatch { name }),
            },
            Entry::Vacant(vacant) => {
                let ordered = Arc::new(init());
                vacant.insert(RegisteredCache::Ordered(Arc::clone(&ordered)));
                Ok(ordered)
            }
        }
    }

    /// Removes the registration for `name`, if any.
    ///
    /// Existing `Arc` handles stay valid; the registry just forgets the
    /// name.
    pub fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        let name = Self::canonical(name)?;
        Ok(self.caches.remove(&name).is_some())
    }

    /// Whether any cache is registered under `name`.
    pub fn contains(&self, name: &str) -> Result<bool, RegistryError> {
        let name = Self::canonical(name)?;
        Ok(self.caches.contains_key(&name))
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}
