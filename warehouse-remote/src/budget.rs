//! Request budget reporting.
//!
//! The remote platform caps how many calls of each kind may be issued within
//! a throttling window. [`BudgetGate`] exposes the platform's own remaining
//! allowance; the [`Retrier`](crate::Retrier) consults it before every
//! attempt and waits, cooperatively, while the budget is exhausted. Budget
//! exhaustion is therefore never surfaced as an error — only as a bounded
//! delay.

/// Kind of remote operation, for budget accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Scalar get.
    Get,
    /// Scalar set.
    Set,
    /// Scalar delete.
    Remove,
    /// Sorted-page retrieval.
    SortedPage,
}

impl OpKind {
    /// All operation kinds, for per-kind bookkeeping.
    pub const ALL: [OpKind; 4] = [OpKind::Get, OpKind::Set, OpKind::Remove, OpKind::SortedPage];
}

/// Reports the remaining permitted calls per operation kind.
///
/// Semantics and window length are owned by the remote platform; this trait
/// only reads them. Callers must not issue a call of `kind` while
/// `remaining(kind)` is zero.
pub trait BudgetGate: Send + Sync {
    /// Remaining permitted calls of `kind` in the current window.
    fn remaining(&self, kind: OpKind) -> u32;
}

/// Budget gate that never throttles.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedBudget;

impl BudgetGate for UnlimitedBudget {
    fn remaining(&self, _kind: OpKind) -> u32 {
        u32::MAX
    }
}
