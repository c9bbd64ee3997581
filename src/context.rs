//! Access to the remaining execution time budget.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reports how much execution time the current attempt has left.
pub trait ExecutionContext: Send + Sync {
    /// Remaining time budget in milliseconds.
    fn remaining_time_budget(&self) -> u64;
}

/// Type alias for a shared ExecutionContext.
pub type SharedExecutionContext = Arc<dyn ExecutionContext>;

impl<T: ExecutionContext + ?Sized> ExecutionContext for Arc<T> {
    fn remaining_time_budget(&self) -> u64 {
        (**self).remaining_time_budget()
    }
}

/// The Lambda context reports its deadline in epoch milliseconds.
impl ExecutionContext for lambda_runtime::Context {
    fn remaining_time_budget(&self) -> u64 {
        remaining_until(self.deadline, SystemTime::now())
    }
}

/// Milliseconds from `now` until `deadline_ms`, saturating at zero.
pub(crate) fn remaining_until(deadline_ms: u64, now: SystemTime) -> u64 {
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    deadline_ms.saturating_sub(now_ms)
}
