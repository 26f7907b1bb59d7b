//! Windowed request budget.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use warehouse_remote::{BudgetGate, OpKind};

/// Remaining allowance for one operation kind within the current window.
#[derive(Debug)]
struct Window {
    remaining: u32,
    opens_at: Instant,
}

/// A per-kind windowed [`BudgetGate`].
///
/// Grants `allowance` calls of each kind per `window`, refilling lazily when
/// the window elapses. Consumption is explicit ([`WindowBudget::consume`])
/// so the store wiring decides what counts against the budget.
///
/// Uses `tokio::time::Instant`, so paused-time tests can drive refills
/// deterministically.
#[derive(Debug)]
pub struct WindowBudget {
    allowance: u32,
    window: Duration,
    kinds: [Mutex<Window>; 4],
}

impl WindowBudget {
    /// Creates a budget of `allowance` calls per `window`, per kind.
    pub fn new(allowance: u32, window: Duration) -> Self {
        let now = Instant::now();
        WindowBudget {
            allowance,
            window,
            kinds: std::array::from_fn(|_| {
                Mutex::new(Window {
                    remaining: allowance,
                    opens_at: now,
                })
            }),
        }
    }

    fn slot(&self, kind: OpKind) -> &Mutex<Window> {
        let index = match kind {
            OpKind::Get => 0,
            OpKind::Set => 1,
            OpKind::Remove => 2,
            OpKind::SortedPage => 3,
        };
        &self.kinds[index]
    }

    fn refill_if_elapsed(&self, window: &mut Window) {
        let now = Instant::now();
        if now.duration_since(window.opens_at) >= self.window {
            window.remaining = self.allowance;
            window.opens_at = now;
        }
    }

    /// Consumes one call of `kind` from the current window.
    ///
    /// Returns `false` when the window is already exhausted.
    pub fn consume(&self, kind: OpKind) -> bool {
        let mut window = self.slot(kind).lock().unwrap_or_else(|e| e.into_inner());
        self.refill_if_elapsed(&mut window);
        if window.remaining == 0 {
            return false;
        }
        window.remaining -= 1;
        true
    }
}

impl BudgetGate for WindowBudget {
    fn remaining(&self, kind: OpKind) -> u32 {
        let mut window = self.slot(kind).lock().unwrap_or_else(|e| e.into_inner());
        self.refill_if_elapsed(&mut window);
        window.remaining
    }
}
