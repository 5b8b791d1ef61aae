//! Taskflow Futures
//!
//! The future layer of the Taskflow engine: handles representing the
//! eventual outcome of tasks that an external engine executes, and on
//! failure re-executes, on its own worker threads.
//!
//! The central type is [`TaskHandle`], a delegating, retry-aware future. It
//! is created at submission time — often before any execution attempt exists
//! — and forwards all queries to whichever [`AttemptFuture`] the engine has
//! currently bound. When an attempt fails with retries remaining, callers
//! blocked in [`TaskHandle::result`] hand off to the replacement attempt via
//! the [`RebindSignal`] without lost wakeups.
//!
//! This crate never decides retry policy; it only waits for externally
//! driven retries to complete.

pub mod attempt;
pub mod error;
pub mod handle;
pub mod signal;

// Re-export commonly used types
pub use attempt::{AttemptFuture, AttemptOutcome, CompletableAttempt, DoneCallback};
pub use error::{ConsistencyError, NoDelegateError, WaitError};
pub use handle::TaskHandle;
pub use signal::RebindSignal;
