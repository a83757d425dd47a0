/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Retry Scheduler
//!
//! Pure function from attempt count to an absolute next-visible
//! deadline: exponential backoff with a cap and full jitter up to a
//! configured factor. No suspension points, no I/O — the Queue
//! Processor calls this synchronously before writing the result back
//! through `schedule_retry`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

/// Tuning knobs for [`next`], sourced from `options.defaultRetryDelay`
/// and friends. Defaults match the component's named defaults:
/// base = 1s, max = 300s, jitter = 10%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// `next(attempt) = min(maxDelay, baseDelay * 2^attempt) * (1 + uniform(0, jitterFactor))`,
    /// returned as an absolute deadline from `now`.
    pub fn next(&self, attempt: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now + ChronoDuration::milliseconds(self.next_delay_ms(attempt) as i64)
    }

    /// The delay component alone, in milliseconds, useful for testing
    /// the monotonicity and cap invariants without depending on the
    /// clock.
    pub fn next_delay_ms(&self, attempt: u32) -> u64 {
        let uncapped = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX).max(1));
        let capped = uncapped.min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.0..self.jitter_factor);
        (capped as f64 * (1.0 + jitter)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_monotone_non_decreasing_before_cap() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        let mut previous = 0;
        for attempt in 0..8 {
            let delay = policy.next_delay_ms(attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay} < {previous}");
            previous = delay;
        }
    }

    #[test]
    fn delay_never_exceeds_max_times_jitter_bound() {
        let policy = RetryPolicy::default();
        let bound = (policy.max_delay_ms as f64 * (1.0 + policy.jitter_factor)) as u64;
        for attempt in 0..20 {
            let delay = policy.next_delay_ms(attempt);
            assert!(delay <= bound, "attempt {attempt}: {delay} > {bound}");
        }
    }

    #[test]
    fn zero_jitter_zero_attempt_equals_base_delay() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.next_delay_ms(0), policy.base_delay_ms);
    }

    #[test]
    fn large_attempt_saturates_at_cap() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.next_delay_ms(63), policy.max_delay_ms);
    }

    #[test]
    fn next_returns_deadline_after_now() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let deadline = policy.next(2, now);
        assert!(deadline > now);
    }
}
