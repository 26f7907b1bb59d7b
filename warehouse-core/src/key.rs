//! Canonical document keys.
//!
//! Every cache and remote operation addresses a document by a [`DocKey`] —
//! the canonical string form of whatever identifier the caller supplied.
//! Normalization happens exactly once, at the edge, so the cache map can
//! never hold two entries for the same logical key.
//!
//! ## Normalization rules
//!
//! - Surrounding whitespace is trimmed.
//! - The trimmed key must be non-empty.
//! - The trimmed key must not exceed [`MAX_KEY_LEN`] bytes (the remote
//!   store's key limit).
//!
//! ```
//! use warehouse_core::{DocKey, KeyError};
//!
//! let key = DocKey::normalize("  player:42 ").unwrap();
//! assert_eq!(key.as_str(), "player:42");
//!
//! assert!(matches!(DocKey::normalize("   "), Err(KeyError::Empty)));
//! ```
//!
//! ## Performance
//!
//! [`DocKey`] wraps a [`SmolStr`], so keys up to 23 bytes are stored inline
//! and clones are cheap either way.

use std::fmt;

use smol_str::SmolStr;

/// Maximum canonical key length in bytes, enforced by the remote store.
pub const MAX_KEY_LEN: usize = 50;

/// Error raised for malformed or oversized keys and names.
///
/// Raised before any remote access is attempted; recoverable by the caller
/// correcting its input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The key was empty after trimming.
    #[error("key is empty")]
    Empty,
    /// The key exceeded [`MAX_KEY_LEN`] bytes.
    #[error("key is {len} bytes, maximum is {MAX_KEY_LEN}")]
    TooLong {
        /// Byte length of the rejected key.
        len: usize,
    },
}

/// A canonical document key.
///
/// Construct via [`DocKey::normalize`] or any [`IntoDocKey`] conversion.
/// Clones are O(1)-ish: short keys are inline, long keys share an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DocKey(SmolStr);

impl DocKey {
    /// Normalizes a raw caller-supplied key into its canonical form.
    pub fn normalize(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        if trimmed.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong { len: trimmed.len() });
        }
        Ok(DocKey(SmolStr::new(trimmed)))
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Conversion of caller-supplied identifiers into canonical [`DocKey`]s.
///
/// Implemented for strings, numeric ids (formatted decimal), and `DocKey`
/// itself (identity, never fails).
pub trait IntoDocKey {
    /// Converts `self` into a canonical key, normalizing as needed.
    fn into_doc_key(self) -> Result<DocKey, KeyError>;
}

impl IntoDocKey for DocKey {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        Ok(self)
    }
}

impl IntoDocKey for &DocKey {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        Ok(self.clone())
    }
}

impl IntoDocKey for &str {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        DocKey::normalize(self)
    }
}

impl IntoDocKey for String {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        DocKey::normalize(&self)
    }
}

impl IntoDocKey for &String {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        DocKey::normalize(self)
    }
}

impl IntoDocKey for SmolStr {
    fn into_doc_key(self) -> Result<DocKey, KeyError> {
        DocKey::normalize(&self)
    }
}

macro_rules! impl_into_doc_key_for_int {
    ($($ty:ty),*) => {
        $(
            impl IntoDocKey for $ty {
                fn into_doc_key(self) -> Result<DocKey, KeyError> {
                    // Decimal form of an integer is always short and non-empty.
                    Ok(DocKey(SmolStr::new(self.to_string())))
                }
            }
        )*
    };
}

impl_into_doc_key_for_int!(i32, i64, u32, u64);
