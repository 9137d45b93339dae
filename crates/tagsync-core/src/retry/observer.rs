//! Retry observation and logging

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Receives callbacks while an operation is retried
pub trait RetryObserver: Send + Sync {
    /// An attempt failed and another one follows after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    /// The operation succeeded on `attempt`
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// The last permitted attempt failed
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display);

    /// The predicate refused to retry
    fn on_non_retryable(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }
}

/// An observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}
    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}
    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// Logs retry events through `tracing`
///
/// Failures that will be retried log at WARN, exhaustion at ERROR, success at
/// INFO when it needed more than one attempt and DEBUG otherwise.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create an observer labelled with the operation name
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        warn!(
            "{} failed on attempt {}: {}. Retrying in {}ms",
            self.operation,
            attempt,
            error,
            delay.as_millis()
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            info!(
                "{} succeeded on attempt {} after {:.2}s",
                self.operation,
                attempt,
                total_duration.as_secs_f64()
            );
        } else {
            debug!("{} succeeded", self.operation);
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        error!(
            "{} failed after {} attempts: {}",
            self.operation, attempts, final_error
        );
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Display) {
        debug!(
            "{} failed on attempt {} with a non-retryable error: {}",
            self.operation, attempt, error
        );
    }
}

/// Counts retry events, for tests and diagnostics
#[derive(Debug, Default)]
pub struct StatsObserver {
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    non_retryable: AtomicU32,
}

impl StatsObserver {
    /// Create an observer with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Failed attempts that were followed by a retry
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Successful completions
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Operations that ran out of attempts
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Operations stopped by the predicate
    pub fn non_retryable(&self) -> u32 {
        self.non_retryable.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_non_retryable(&self, _attempt: u32, _error: &dyn Display) {
        self.non_retryable.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Display) {
        (**self).on_non_retryable(attempt, error)
    }
}
