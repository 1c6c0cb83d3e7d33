//! Cooperative resource limits.
//!
//! The search core polls a [`ResourceManager`] at safe points (between
//! propagation rounds and before decisions). Exceeding a limit aborts the
//! search with a dedicated outcome distinct from sat/unsat; it is never an
//! error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a resource poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStatus {
    /// All limits respected.
    Ok,
    /// The wall-clock deadline passed.
    TimeOut,
    /// The conflict budget is exhausted.
    ConflictBudget,
    /// An external interrupt was requested.
    Interrupted,
}

impl LimitStatus {
    /// True when the search may continue.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, LimitStatus::Ok)
    }
}

/// Externally configured limits, polled cooperatively.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    deadline: Option<Instant>,
    conflict_budget: Option<u64>,
    interrupt: Arc<AtomicBool>,
}

impl ResourceManager {
    /// A manager with no limits set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: None,
            conflict_budget: None,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Limit wall-clock time, measured from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Limit the number of conflicts.
    #[must_use]
    pub fn with_conflict_budget(mut self, budget: u64) -> Self {
        self.conflict_budget = Some(budget);
        self
    }

    /// Shared flag for requesting an interrupt from another thread or a
    /// signal handler.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Request an interrupt.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Poll all limits given the current conflict count.
    #[must_use]
    pub fn check(&self, conflicts: u64) -> LimitStatus {
        if self.interrupt.load(Ordering::Relaxed) {
            return LimitStatus::Interrupted;
        }
        if let Some(budget) = self.conflict_budget {
            if conflicts >= budget {
                return LimitStatus::ConflictBudget;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return LimitStatus::TimeOut;
            }
        }
        LimitStatus::Ok
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_manager_is_ok() {
        let rm = ResourceManager::new();
        assert!(rm.check(1_000_000).is_ok());
    }

    #[test]
    fn test_conflict_budget() {
        let rm = ResourceManager::new().with_conflict_budget(10);
        assert!(rm.check(9).is_ok());
        assert_eq!(rm.check(10), LimitStatus::ConflictBudget);
    }

    #[test]
    fn test_interrupt_flag() {
        let rm = ResourceManager::new();
        let flag = rm.interrupt_flag();
        assert!(rm.check(0).is_ok());
        flag.store(true, std::sync::atomic::Ordering::Relaxed);
        assert_eq!(rm.check(0), LimitStatus::Interrupted);
    }

    #[test]
    fn test_timeout_in_the_past() {
        let rm = ResourceManager::new().with_timeout(Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(rm.check(0), LimitStatus::TimeOut);
    }
}
