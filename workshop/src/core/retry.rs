//! Retry classification and Fibonacci backoff.
//!
//! Any reason containing one of the keywords below is retried, which includes
//! every reason mentioning `failed`, `failure` or `error`. A missing session
//! ("not logged on") anywhere in the diagnostics is always fatal.

use std::time::Duration;

use crate::error::WorkshopError;

/// Base interval multiplied by the Fibonacci term to get each delay.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(2);
/// Retries after the first attempt (so 11 attempts in total).
pub const DEFAULT_MAX_RETRIES: u32 = 10;

const RETRYABLE_KEYWORDS: [&str; 16] = [
    "timeout",
    "connection",
    "network",
    "server",
    "unavailable",
    "busy",
    "rate limit",
    "throttle",
    "no connection",
    "steam servers",
    "failure",
    "failed",
    "error",
    "temporary",
    "retry",
    "please try",
];

const NOT_LOGGED_ON: &str = "not logged on";

/// True if `reason` contains any retryable keyword (case-insensitive).
pub fn is_retryable_reason(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    RETRYABLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// True if `text` reports that SteamCMD has no authenticated session.
pub fn mentions_not_logged_on(text: &str) -> bool {
    text.to_lowercase().contains(NOT_LOGGED_ON)
}

/// What the orchestrator should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then run the next attempt.
    RetryAfter(Duration),
    /// The failure cannot be fixed by retrying.
    Fatal,
    /// The failure was retryable but the attempt budget is spent.
    Exhausted,
}

/// Bounded retry schedule with Fibonacci-scaled delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_INTERVAL, DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(base_interval: Duration, max_retries: u32) -> Self {
        Self {
            base_interval,
            max_attempts: max_retries.saturating_add(1),
        }
    }

    /// Whether a failure is worth another attempt.
    ///
    /// `diagnostics` is everything else known about the attempt (captured output,
    /// console log tail); a "not logged on" anywhere makes the failure fatal.
    pub fn is_retryable(&self, error: &WorkshopError, diagnostics: &str) -> bool {
        let Some(reason) = error.retry_reason() else {
            return false;
        };
        if mentions_not_logged_on(reason) || mentions_not_logged_on(diagnostics) {
            return false;
        }
        is_retryable_reason(reason)
    }

    /// Decide what follows failed attempt `attempt` (1-based).
    pub fn decide(&self, attempt: u32, error: &WorkshopError, diagnostics: &str) -> RetryDecision {
        if !self.is_retryable(error, diagnostics) {
            return RetryDecision::Fatal;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.delay_after(attempt))
    }

    /// Delay before attempt `attempt + 1`: `base * fib(attempt)` with fib = 1, 2, 3, 5, 8...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = u32::try_from(fibonacci(attempt)).unwrap_or(u32::MAX);
        self.base_interval.saturating_mul(factor)
    }
}

/// Whole milliseconds in `delay`, saturating at `u64::MAX`.
pub fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Terms 1, 2, 3, 5, 8, ... for n = 1, 2, 3, 4, 5, ...; saturates instead of overflowing.
/// `n = 0` is treated as the first term.
fn fibonacci(n: u32) -> u64 {
    let (mut curr, mut next) = (1u64, 1u64);
    for _ in 1..n {
        let sum = curr.saturating_add(next);
        curr = next;
        next = sum;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(reason: &str) -> WorkshopError {
        WorkshopError::Download {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert!(is_retryable_reason("CONNECTION TIMEOUT"));
        assert!(is_retryable_reason("Connection Timeout"));
        assert!(is_retryable_reason("connection timeout"));
    }

    #[test]
    fn timeout_reason_is_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&download("Timeout"), ""));
    }

    #[test]
    fn invalid_password_is_fatal() {
        let policy = RetryPolicy::default();
        let err = WorkshopError::Login {
            reason: "Invalid Password".to_string(),
        };
        assert!(!policy.is_retryable(&err, ""));
        assert_eq!(policy.decide(1, &err, ""), RetryDecision::Fatal);
    }

    #[test]
    fn invalid_item_id_is_fatal() {
        assert!(!is_retryable_reason("invalid workshop item ID"));
    }

    #[test]
    fn not_logged_on_overrides_keyword_match() {
        let policy = RetryPolicy::default();
        let err = WorkshopError::Execution {
            message: "failed to run SteamCMD: exit status 5".to_string(),
        };
        assert!(policy.is_retryable(&err, "Loading Steam API...OK"));
        assert!(!policy.is_retryable(&err, "ERROR (Not logged on)"));
    }

    #[test]
    fn unrecognized_output_retries_via_sentinel_reason() {
        let policy = RetryPolicy::default();
        let err = WorkshopError::Unrecognized {
            raw_text: "Steam>".to_string(),
        };
        assert!(policy.is_retryable(&err, "Steam>"));
    }

    #[test]
    fn fibonacci_delays_scale_base_interval() {
        let policy = RetryPolicy::new(Duration::from_secs(2), 10);
        let delays: Vec<u64> = (1..=6).map(|n| policy.delay_after(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6, 10, 16, 26]);
    }

    #[test]
    fn decide_stops_when_attempts_exhausted() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 2);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.decide(2, &download("Timeout"), ""),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(3, &download("Timeout"), ""),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn delay_millis_saturates() {
        assert_eq!(delay_millis(Duration::from_secs(2)), 2000);
        assert_eq!(delay_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn delays_saturate_instead_of_overflowing() {
        let policy = RetryPolicy::new(Duration::from_secs(2), u32::MAX);
        assert_eq!(policy.delay_after(500), Duration::from_secs(2).saturating_mul(u32::MAX));
    }
}
