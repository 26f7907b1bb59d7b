//! Document values and their two representations.
//!
//! A document exists in two shapes:
//!
//! - **Active** — the in-memory, application-facing [`Document`] enum.
//! - **Dormant** — the wire shape persisted remotely: the JSON encoding of
//!   the active shape, carried as [`Raw`] bytes.
//!
//! A document transitions active → dormant on commit and dormant → active on
//! load. The wire encoding is deliberately plain: a scalar document is a bare
//! JSON scalar, a structured document is a JSON object, so the remote side
//! stores exactly what a non-caching client would have written.
//!
//! ## Templates
//!
//! A [`Document`] supplied at cache-creation time acts as the template for
//! missing data. [`Document::reconcile`] applies the rules:
//!
//! - remote value absent ⇒ template verbatim;
//! - both template and loaded value structured ⇒ structural merge (loaded
//!   fields win, template fills the gaps);
//! - otherwise the loaded value wins unmerged.
//!
//! ```
//! use warehouse_core::{Document, Scalar};
//!
//! let template = Document::structured([("gold", 0.into()), ("level", 1.into())]);
//! let loaded = Document::structured([("gold", 250.into())]);
//!
//! let doc = Document::reconcile(Some(&template), Some(loaded)).unwrap();
//! assert_eq!(doc.field("gold"), Some(&Scalar::Int(250)));
//! assert_eq!(doc.field("level"), Some(&Scalar::Int(1)));
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use smol_str::SmolStr;

/// Raw byte data type for dormant (wire-shape) documents.
/// `Bytes` gives cheap reference-counted cloning.
pub type Raw = Bytes;

/// A primitive document value.
///
/// Equality is by value; floats compare bitwise so that equality stays
/// reflexive and usable for no-op update detection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(SmolStr),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Scalar {
    /// Returns the numeric value of an `Int` or `Float` scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(SmolStr::new(value))
    }
}

/// The active (in-memory) representation of a cached value.
///
/// Either a single scalar or a flat string-keyed map of scalars. The split is
/// explicit so structural template merging only ever applies to the
/// [`Document::Structured`] variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Document {
    /// A single primitive value.
    Scalar(Scalar),
    /// A flat map of named primitive fields.
    Structured(BTreeMap<SmolStr, Scalar>),
}

impl Document {
    /// Builds a structured document from `(field, scalar)` pairs.
    pub fn structured<K, I>(fields: I) -> Self
    where
        K: Into<SmolStr>,
        I: IntoIterator<Item = (K, Scalar)>,
    {
        Document::Structured(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Returns a field of a structured document, `None` for scalars or
    /// absent fields.
    pub fn field(&self, name: &str) -> Option<&Scalar> {
        match self {
            Document::Structured(map) => map.get(name),
            Document::Scalar(_) => None,
        }
    }

    /// Returns the numeric value of a scalar document.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Scalar(scalar) => scalar.as_f64(),
            Document::Structured(_) => None,
        }
    }

    /// Encodes the active document into its dormant wire shape.
    pub fn to_dormant(&self) -> Result<Raw, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Decodes a dormant wire-shape value back into an active document.
    pub fn from_dormant(raw: &Raw) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Applies template reconciliation to a freshly loaded value.
    ///
    /// Returns `None` only when there is neither a loaded value nor a
    /// template.
    pub fn reconcile(template: Option<&Document>, loaded: Option<Document>) -> Option<Document> {
        match (template, loaded) {
            (_, Some(Document::Structured(mut fields))) => {
                if let Some(Document::Structured(defaults)) = template {
                    for (name, value) in defaults {
                        fields.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
                Some(Document::Structured(fields))
            }
            (_, Some(loaded)) => Some(loaded),
            (Some(template), None) => Some(template.clone()),
            (None, None) => None,
        }
    }
}

impl From<Scalar> for Document {
    fn from(value: Scalar) -> Self {
        Document::Scalar(value)
    }
}

macro_rules! impl_document_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Document {
                fn from(value: $ty) -> Self {
                    Document::Scalar(value.into())
                }
            }
        )*
    };
}

impl_document_from_scalar!(bool, i32, i64, f64, &str);
