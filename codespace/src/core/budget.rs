//! Wall-clock budget helpers for snippet execution.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

/// Deadline for a run starting now, or `None` when `timeout_ms` is zero (unlimited).
pub fn deadline_after(timeout_ms: u64) -> Option<Instant> {
    (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms))
}

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(anyhow!("execution timed out"));
    }
    Ok(remaining)
}
