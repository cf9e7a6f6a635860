//! Iteration ceiling for the executor drive loop.

/// Reason reported when the ceiling is hit.
pub const ITERATION_BUDGET_EXCEEDED: &str = "iteration budget exceeded";

/// Counts executed steps against a hard ceiling.
///
/// The ceiling is independent of the router's own termination bound and only
/// trips if routing stops making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    used: u32,
    max: u32,
}

impl IterationBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// Claim one iteration. Returns false once the ceiling has been reached.
    pub fn try_claim(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}
