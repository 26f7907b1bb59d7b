//! Guard and transform seams for the update validation pipeline.
//!
//! Every proposed update flows through an ordered chain of [`Transform`]s and
//! then an ordered chain of [`Guard`]s. Both are pure, synchronous functions
//! of the proposed change:
//!
//! - a **transform** rewrites the proposed new value (it may veto a change by
//!   returning the old value unchanged);
//! - a **guard** allows or denies the already-transformed value, and the
//!   first denial short-circuits the rest of the chain.
//!
//! Closures implement both traits directly:
//!
//! ```
//! use warehouse_core::{Change, Document, Guard, Verdict};
//!
//! let non_negative = |change: &Change<'_>| -> Verdict {
//!     match change.new.as_f64() {
//!         Some(v) if v < 0.0 => Verdict::Deny,
//!         _ => Verdict::Allow,
//!     }
//! };
//! # fn take(_: impl Guard) {}
//! # take(non_negative);
//! ```
//!
//! [`Bound`] scopes a guard or transform to a single field of a structured
//! document instead of the whole value.

use smol_str::SmolStr;

use crate::document::{Document, Scalar};
use crate::key::DocKey;

/// Who initiated a proposed update.
///
/// Threaded through the pipeline so guards and transforms can distinguish,
/// for example, direct API writes from replicated ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateSource {
    /// An unattributed update issued by the owning process.
    #[default]
    System,
    /// An update attributed to a named caller.
    Caller(SmolStr),
}

impl UpdateSource {
    /// Creates a caller-attributed source.
    pub fn caller(name: impl Into<SmolStr>) -> Self {
        UpdateSource::Caller(name.into())
    }
}

/// A proposed update as seen by guards and transforms.
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    /// Canonical key being updated.
    pub key: &'a DocKey,
    /// Current cached value, if the key is cached.
    pub old: Option<&'a Document>,
    /// Proposed new value (for guards: after all transforms ran).
    pub new: &'a Document,
    /// Who initiated the update.
    pub source: &'a UpdateSource,
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The update may proceed.
    Allow,
    /// The update is rejected; the whole set becomes a no-op.
    Deny,
}

/// Predicate gating whether a proposed update is allowed.
pub trait Guard: Send + Sync {
    /// Checks the transformed change.
    fn check(&self, change: &Change<'_>) -> Verdict;
}

impl<F> Guard for F
where
    F: Fn(&Change<'_>) -> Verdict + Send + Sync,
{
    fn check(&self, change: &Change<'_>) -> Verdict {
        self(change)
    }
}

/// Function rewriting a proposed update's value before guards run.
pub trait Transform: Send + Sync {
    /// Produces the replacement new value for the change.
    fn apply(&self, change: &Change<'_>) -> Document;
}

impl<F> Transform for F
where
    F: Fn(&Change<'_>) -> Document + Send + Sync,
{
    fn apply(&self, change: &Change<'_>) -> Document {
        self(change)
    }
}

/// Scopes a guard or transform to one field of a structured document.
///
/// The inner guard/transform sees a scalar-shaped [`Change`] holding just
/// that field. For scalar documents, or when the field is absent from the
/// proposed value, a bound guard allows and a bound transform is the
/// identity.
#[derive(Debug, Clone)]
pub struct Bound<T> {
    field: SmolStr,
    inner: T,
}

impl<T> Bound<T> {
    /// Binds `inner` to the given field name.
    pub fn new(field: impl Into<SmolStr>, inner: T) -> Self {
        Bound {
            field: field.into(),
            inner,
        }
    }
}

impl<T> Bound<T> {
    fn scoped_old(&self, change: &Change<'_>) -> Option<Document> {
        change
            .old
            .and_then(|old| old.field(&self.field))
            .cloned()
            .map(Document::Scalar)
    }
}

impl<G: Guard> Guard for Bound<G> {
    fn check(&self, change: &Change<'_>) -> Verdict {
        let Some(scalar) = change.new.field(&self.field) else {
            return Verdict::Allow;
        };
        let new = Document::Scalar(scalar.clone());
        let old = self.scoped_old(change);
        let scoped = Change {
            key: change.key,
            old: old.as_ref(),
            new: &new,
            source: change.source,
        };
        self.inner.check(&scoped)
    }
}

impl<T: Transform> Transform for Bound<T> {
    fn apply(&self, change: &Change<'_>) -> Document {
        let Document::Structured(fields) = change.new else {
            return change.new.clone();
        };
        let Some(scalar) = fields.get(&self.field) else {
            return change.new.clone();
        };
        let new = Document::Scalar(scalar.clone());
        let old = self.scoped_old(change);
        let scoped = Change {
            key: change.key,
            old: old.as_ref(),
            new: &new,
            source: change.source,
        };
        let mut fields = fields.clone();
        if let Document::Scalar(replacement) = self.inner.apply(&scoped) {
            fields.insert(self.field.clone(), replacement);
        }
        Document::Structured(fields)
    }
}

/// Identity transform: proposes the change's new value unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn apply(&self, change: &Change<'_>) -> Document {
        change.new.clone()
    }
}
