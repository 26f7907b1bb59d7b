#![warn(missing_docs)]
//! # warehouse-core
//!
//! Core types and traits for the Warehouse caching and synchronization
//! layer.
//!
//! This crate provides the foundational abstractions shared by the cache
//! orchestration crate (`warehouse`) and remote-store implementations
//! (`warehouse-memory`). It defines:
//!
//! - **Keys** — canonical document keys with normalization ([`DocKey`])
//! - **Documents** — the active/dormant value model ([`Document`], [`Raw`])
//! - **Validation seams** — update guards and transforms ([`Guard`],
//!   [`Transform`], [`Bound`])
//! - **Notifications** — explicit event-sink strategy traits
//!   ([`WarehouseEvents`], [`OrderedEvents`])
//! - **Ordered view types** — ([`OrderedEntry`], [`SortOrder`],
//!   [`PageLimit`])

pub mod document;
pub mod events;
pub mod guard;
pub mod key;
pub mod ordered;

pub use document::{Document, Raw, Scalar};
pub use events::{NoopEvents, OrderedEvents, WarehouseEvents};
pub use guard::{Bound, Change, Guard, IdentityTransform, Transform, UpdateSource, Verdict};
pub use key::{DocKey, IntoDocKey, KeyError, MAX_KEY_LEN};
pub use ordered::{OrderedEntry, PageLimit, SortOrder};
#[doc(hidden)]
pub use smol_str::SmolStr;
