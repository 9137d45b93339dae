//! Retry execution engine with policy-based configuration
//!
//! Used by the tag applier to retry pushes that failed for transient reasons
//! (rate limiting, gateway errors, timeouts). Deterministic failures are
//! filtered out by a [`RetryPredicate`] and returned after a single attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagsync_core::retry::{RetryExecutor, TracingObserver};
//! use tagsync_core::types::RetryPolicy;
//!
//! async fn example() {
//!     let result = RetryExecutor::new(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("push"))
//!         .execute(|| async { Ok::<_, std::io::Error>("pushed") })
//!         .await;
//!     assert!(result.is_ok());
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, RetryPredicate};
