//! Wall-clock budget for one top-level execution

use crate::{GlyphError, GlyphResult, ResourceLimits};
use std::fmt;
use std::time::{Duration, Instant};

/// Where the evaluator looked at the clock
#[derive(Debug, Clone, Copy)]
pub enum Checkpoint<'a> {
    /// Start of the given iteration of a `while` or `for` loop
    LoopIteration(u64),
    /// Entry to the named function or lambda
    Call(&'a str),
}

impl fmt::Display for Checkpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::LoopIteration(n) => write!(f, "loop iteration {}", n),
            Checkpoint::Call(name) => write!(f, "call to '{}'", name),
        }
    }
}

/// Started when a route, command or other entry point begins; every nested call
/// and loop shares it
#[derive(Debug)]
pub struct TimeoutTracker {
    started: Instant,
    budget: Duration,
}

impl TimeoutTracker {
    pub fn start(limits: &ResourceLimits) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(limits.max_evaluation_time_ms),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail once the execution has outlived its budget
    pub fn check(&self, at: Checkpoint<'_>) -> GlyphResult<()> {
        let elapsed = self.elapsed();
        if elapsed <= self.budget {
            return Ok(());
        }
        Err(GlyphError::ResourceLimitExceeded {
            limit_name: "max_evaluation_time_ms".to_string(),
            limit_value: self.budget.as_millis().to_string(),
            actual_value: elapsed.as_millis().to_string(),
            suggestion: format!(
                "Execution was still running at {} after {}ms; look for unbounded loops or raise the limit",
                at,
                elapsed.as_millis()
            ),
        })
    }
}
