#![warn(missing_docs)]
//! # warehouse-remote
//!
//! The remote-access layer of the Warehouse caching stack: the
//! [`RemoteStore`] seam, the [`BudgetGate`] request-budget seam, and the
//! [`Retrier`] that wraps single remote calls with budget-aware pacing and
//! bounded retry.
//!
//! If you want to put Warehouse in front of your own key-value service,
//! implement [`RemoteStore`] (and [`BudgetGate`] if the service throttles
//! you) here.

mod budget;
mod error;
mod retry;
mod store;

pub use budget::{BudgetGate, OpKind, UnlimitedBudget};
pub use error::RemoteError;
pub use retry::{DEFAULT_BUDGET_POLL, DEFAULT_MAX_ATTEMPTS, Retrier, RetryExhausted};
pub use store::{RemoteResult, RemoteStore};
