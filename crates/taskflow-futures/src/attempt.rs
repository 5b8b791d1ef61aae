//! Execution attempts: the engine-owned futures a task handle delegates to.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use taskflow_core::{AttemptId, TaskError, TaskPayload};

use crate::error::WaitError;

/// Outcome of one finished execution attempt.
pub type AttemptOutcome<T> = Result<TaskPayload<T>, TaskError>;

/// Completion callback invoked exactly once when an attempt finishes.
pub type DoneCallback<T> = Box<dyn FnOnce(&AttemptOutcome<T>) + Send + 'static>;

/// Interface of one concrete run attempt of a task.
///
/// The engine creates a fresh attempt for every run, including retries, and
/// completes it from its worker threads. A task handle only ever holds these
/// behind a shared reference; the attempt's lifecycle belongs to the engine.
pub trait AttemptFuture<T>: Send + Sync {
    /// True once the attempt reached a terminal state.
    fn done(&self) -> bool;

    /// True while the attempt is executing on a worker.
    fn running(&self) -> bool;

    /// True if the attempt was cancelled.
    fn cancelled(&self) -> bool;

    /// Request cancellation; returns whether the attempt was cancelled.
    fn cancel(&self) -> bool;

    /// Retries the engine will still grant after a failure. Zero means the
    /// next failure is final.
    fn retries_left(&self) -> u32;

    /// Block for the attempt's payload, bounded by `timeout`.
    fn result(&self, timeout: Option<Duration>) -> Result<TaskPayload<T>, WaitError>;

    /// Block for the attempt's failure, if any. `Ok(None)` on success.
    fn error(&self, timeout: Option<Duration>) -> Result<Option<TaskError>, WaitError>;

    /// Register a callback invoked once the attempt finishes. Callbacks
    /// registered after completion fire immediately on the calling thread.
    fn on_done(&self, callback: DoneCallback<T>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    Finished,
    Cancelled,
}

struct AttemptState<T> {
    phase: Phase,
    outcome: Option<AttemptOutcome<T>>,
    callbacks: Vec<DoneCallback<T>>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Shared-state attempt future completed by engine worker threads.
///
/// The standard [`AttemptFuture`] implementation for in-process engines: the
/// scheduler constructs one per run, a worker thread drives it through
/// `mark_running` and `complete`/`fail`, and any number of threads block on
/// `result`.
pub struct CompletableAttempt<T> {
    id: AttemptId,
    retries_left: AtomicU32,
    state: Mutex<AttemptState<T>>,
    finished: Condvar,
}

impl<T: Clone + Send + 'static> CompletableAttempt<T> {
    /// Create a pending attempt with the given retry budget.
    pub fn new(retries_left: u32) -> Self {
        Self {
            id: AttemptId::generate(),
            retries_left: AtomicU32::new(retries_left),
            state: Mutex::new(AttemptState {
                phase: Phase::Pending,
                outcome: None,
                callbacks: Vec::new(),
                started_at: None,
                finished_at: None,
            }),
            finished: Condvar::new(),
        }
    }

    /// This attempt's identifier.
    pub fn id(&self) -> &AttemptId {
        &self.id
    }

    /// Engine hook: update the remaining retry budget.
    pub fn set_retries_left(&self, retries: u32) {
        self.retries_left.store(retries, Ordering::SeqCst);
    }

    /// Mark the attempt as executing. No-op unless it is still pending.
    pub fn mark_running(&self) {
        let mut state = self.state.lock().unwrap();
        if state.phase == Phase::Pending {
            state.phase = Phase::Running;
            state.started_at = Some(Utc::now());
        }
    }

    /// Complete with a payload. Returns false if already finished.
    pub fn complete(&self, payload: TaskPayload<T>) -> bool {
        self.finish(Phase::Finished, Ok(payload))
    }

    /// Complete with a plain value.
    pub fn complete_value(&self, value: T) -> bool {
        self.complete(TaskPayload::Value(value))
    }

    /// Complete with a failure. Returns false if already finished.
    pub fn fail(&self, error: TaskError) -> bool {
        self.finish(Phase::Finished, Err(error))
    }

    /// When the attempt started executing, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().started_at
    }

    /// When the attempt finished, if it has.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().finished_at
    }

    fn finish(&self, phase: Phase, outcome: AttemptOutcome<T>) -> bool {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            if state.outcome.is_some() {
                return false;
            }
            state.phase = phase;
            state.finished_at = Some(Utc::now());
            state.outcome = Some(outcome.clone());
            self.finished.notify_all();
            std::mem::take(&mut state.callbacks)
        };
        debug!(attempt_id = %self.id, outcome_ok = outcome.is_ok(), "attempt finished");
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    fn wait_for_outcome(&self, timeout: Option<Duration>) -> Result<AttemptOutcome<T>, WaitError> {
        let mut state = self.state.lock().unwrap();
        match timeout {
            None => {
                while state.outcome.is_none() {
                    state = self.finished.wait(state).unwrap();
                }
            }
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while state.outcome.is_none() {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::Timeout);
                    }
                    let (guard, _) = self.finished.wait_timeout(state, deadline - now).unwrap();
                    state = guard;
                }
            }
        }
        match &state.outcome {
            Some(outcome) => Ok(outcome.clone()),
            None => Err(WaitError::Timeout),
        }
    }
}

impl<T: Clone + Send + 'static> AttemptFuture<T> for CompletableAttempt<T> {
    fn done(&self) -> bool {
        self.state.lock().unwrap().outcome.is_some()
    }

    fn running(&self) -> bool {
        self.state.lock().unwrap().phase == Phase::Running
    }

    fn cancelled(&self) -> bool {
        self.state.lock().unwrap().phase == Phase::Cancelled
    }

    fn cancel(&self) -> bool {
        // A running or finished attempt can no longer be cancelled.
        let (callbacks, outcome) = {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Running || state.outcome.is_some() {
                return false;
            }
            state.phase = Phase::Cancelled;
            state.finished_at = Some(Utc::now());
            let outcome: AttemptOutcome<T> = Err(TaskError::Cancelled);
            state.outcome = Some(outcome.clone());
            self.finished.notify_all();
            (std::mem::take(&mut state.callbacks), outcome)
        };
        debug!(attempt_id = %self.id, "attempt cancelled");
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    fn retries_left(&self) -> u32 {
        self.retries_left.load(Ordering::SeqCst)
    }

    fn result(&self, timeout: Option<Duration>) -> Result<TaskPayload<T>, WaitError> {
        match self.wait_for_outcome(timeout)? {
            Ok(payload) => Ok(payload),
            Err(error) => Err(WaitError::Failed(error)),
        }
    }

    fn error(&self, timeout: Option<Duration>) -> Result<Option<TaskError>, WaitError> {
        match self.wait_for_outcome(timeout)? {
            Ok(_) => Ok(None),
            Err(error) => Ok(Some(error)),
        }
    }

    fn on_done(&self, callback: DoneCallback<T>) {
        let pending_outcome = {
            let mut state = self.state.lock().unwrap();
            match &state.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    state.callbacks.push(callback);
                    return;
                }
            }
        };
        if let Some(outcome) = pending_outcome {
            callback(&outcome);
        }
    }
}
