//! Types for the bounded, sorted secondary view.

use std::cmp::Ordering;

use bounded_integer::bounded_integer;
use serde::{Deserialize, Serialize};

use crate::key::DocKey;

bounded_integer! {
    /// Capacity of a sorted page request (1-100).
    /// The remote sorted-page endpoint rejects anything outside this range,
    /// so out-of-range requests are clamped rather than refused.
    #[repr(u8)]
    pub struct PageLimit { 1..=100 }
}

impl PageLimit {
    /// Default page capacity when the caller does not specify one.
    pub const DEFAULT: PageLimit = PageLimit::new_saturating(50);

    /// Clamps an arbitrary requested capacity into the valid range.
    pub fn clamped(requested: usize) -> PageLimit {
        PageLimit::new_saturating(requested.min(u8::MAX as usize) as u8)
    }
}

/// Sort direction for the ordered view, by numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest values first.
    Ascending,
    /// Largest values first.
    #[default]
    Descending,
}

impl SortOrder {
    /// Compares two entries under this order.
    ///
    /// Equal values tie-break by key, ascending, so the resulting sequence
    /// is deterministic regardless of input order.
    pub fn compare(&self, a: &OrderedEntry, b: &OrderedEntry) -> Ordering {
        let by_value = match self {
            SortOrder::Ascending => a.value.total_cmp(&b.value),
            SortOrder::Descending => b.value.total_cmp(&a.value),
        };
        by_value.then_with(|| a.key.cmp(&b.key))
    }
}

/// A `(key, numeric value)` pair held by the ordered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedEntry {
    /// Canonical key of the document.
    pub key: DocKey,
    /// Numeric value the view is sorted by.
    pub value: f64,
}

impl OrderedEntry {
    /// Creates a new ordered entry.
    pub fn new(key: DocKey, value: f64) -> Self {
        OrderedEntry { key, value }
    }
}
