//! Retry policy shared by every register transaction

use core::time::Duration;

/// Default number of attempts per transaction
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between attempts in milliseconds
pub const DEFAULT_ATTEMPT_DELAY_MS: u64 = 10;

/// Smallest delay a policy will use between attempts in milliseconds
pub const MIN_ATTEMPT_DELAY_MS: u64 = 1;

/// How persistently the channel retries a transaction
///
/// Built once per session and immutable afterwards. Construction never
/// fails: out-of-range inputs are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    attempt_delay: Duration,
    max_sub_attempts: u32,
}

impl RetryPolicy {
    /// Normalize raw user input into a policy
    ///
    /// `max_attempts` is clamped to at least 1 and `delay_ms` to at least
    /// [`MIN_ATTEMPT_DELAY_MS`]. The read-back poll budget is derived as
    /// `max(max_attempts / 10, 1)`.
    pub fn new(max_attempts: i64, delay_ms: i64) -> Self {
        let max_attempts = max_attempts.clamp(1, u32::MAX as i64) as u32;
        let delay_ms = (delay_ms.max(MIN_ATTEMPT_DELAY_MS as i64)) as u64;

        Self {
            max_attempts,
            attempt_delay: Duration::from_millis(delay_ms),
            max_sub_attempts: (max_attempts / 10).max(1),
        }
    }

    /// Maximum number of attempts per transaction (outer loop)
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts and between read-back polls
    pub fn attempt_delay(&self) -> Duration {
        self.attempt_delay
    }

    /// Read-back polls performed after each write before re-sending it
    pub fn max_sub_attempts(&self) -> u32 {
        self.max_sub_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS as i64,
            DEFAULT_ATTEMPT_DELAY_MS as i64,
        )
    }
}
