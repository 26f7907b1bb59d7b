#![warn(missing_docs)]
//! # warehouse-memory
//!
//! In-memory [`RemoteStore`](warehouse_remote::RemoteStore) implementation
//! for Warehouse, plus a windowed [`BudgetGate`](warehouse_remote::BudgetGate).
//!
//! [`MemoryStore`] is the development and test store: it counts calls per
//! operation kind and supports transient fault injection, so coalescing and
//! retry behavior can be asserted precisely.

mod budget;
mod store;

pub use budget::WindowBudget;
pub use store::{MemoryStore, StoreCounters};
