//! Backoff waits and cooperative cancellation.
//!
//! The orchestrator never sleeps directly: it asks a [`Scheduler`] to wait, and
//! the wait returns early with [`WorkshopError::Cancelled`] when the caller's
//! [`CancelToken`] fires. Tests substitute a recording scheduler so backoff
//! sequencing is checked without wall-clock waits.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::retry::delay_millis;
use crate::error::WorkshopError;

/// Clonable cancellation flag shared between a caller and an orchestration call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and wake any thread blocked in [`CancelToken::wait_timeout`].
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `delay`. Returns `true` if cancelled before it elapsed.
    pub fn wait_timeout(&self, delay: Duration) -> bool {
        let deadline = Instant::now().checked_add(delay);
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => delay,
            };
            if remaining.is_zero() {
                return false;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(cancelled, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            cancelled = guard;
        }
        true
    }

    /// `Err(Cancelled)` if cancellation has been signalled.
    pub fn check(&self) -> Result<(), WorkshopError> {
        if self.is_cancelled() {
            return Err(WorkshopError::Cancelled);
        }
        Ok(())
    }
}

/// Suspension point between retry attempts.
pub trait Scheduler {
    /// Wait for `delay`, or return `Err(Cancelled)` as soon as `cancel` fires.
    fn wait(&self, delay: Duration, cancel: &CancelToken) -> Result<(), WorkshopError>;
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    fn wait(&self, delay: Duration, cancel: &CancelToken) -> Result<(), WorkshopError> {
        (**self).wait(delay, cancel)
    }
}

/// Scheduler that blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn wait(&self, delay: Duration, cancel: &CancelToken) -> Result<(), WorkshopError> {
        debug!(delay_ms = delay_millis(delay), "waiting before next attempt");
        if cancel.wait_timeout(delay) {
            debug!("wait interrupted by cancellation");
            return Err(WorkshopError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_completes_when_not_cancelled() {
        let token = CancelToken::new();
        ThreadScheduler
            .wait(Duration::from_millis(10), &token)
            .expect("wait");
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancelled_token_short_circuits_wait() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        let err = ThreadScheduler
            .wait(Duration::from_secs(30), &token)
            .unwrap_err();
        assert_eq!(err, WorkshopError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_from_another_thread_wakes_waiter() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let start = Instant::now();
        let result = ThreadScheduler.wait(Duration::from_secs(30), &token);
        handle.join().expect("join");
        assert_eq!(result, Err(WorkshopError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn check_reports_cancellation() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert_eq!(token.check(), Err(WorkshopError::Cancelled));
    }
}
