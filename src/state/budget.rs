/// Ceiling on non-recoverable request failures for one run
///
/// Failures are cumulative across the whole run. Once the count reaches the
/// ceiling the run must stop issuing requests; checks happen at loop
/// boundaries, never preemptively.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    ceiling: u32,
    failures: u32,
}

impl FailureBudget {
    /// Creates a budget that is exhausted after `ceiling` failures
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            failures: 0,
        }
    }

    /// Charges one failure; returns `true` if the budget is now exhausted
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.ceiling
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.failures)
    }
}
