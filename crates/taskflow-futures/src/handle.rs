//! Delegating, retry-aware task handles.
//!
//! A [`TaskHandle`] represents the eventual outcome of a task that an
//! external engine may execute, and re-execute, any number of times. The
//! handle usually exists before the first attempt does; once the engine binds
//! an attempt, all status and result queries forward to it. When an attempt
//! fails with retries remaining, callers blocked in [`TaskHandle::result`]
//! park on the rebind signal and resume against the replacement attempt, so a
//! retry is invisible to them except as elapsed time.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, error, warn};

use taskflow_core::{
    HandleState, OutputArtifact, TaskError, TaskId, TaskPayload, TerminalState,
};

use crate::attempt::{AttemptFuture, DoneCallback};
use crate::error::{ConsistencyError, NoDelegateError, WaitError};
use crate::signal::RebindSignal;

type SharedAttempt<T> = Arc<dyn AttemptFuture<T>>;

/// Which of the two mutually exclusive resolution paths a handle took.
///
/// The `Unset` state is consumed exactly once; there is no code path that
/// mixes the two, and an operation belonging to the other path fails with a
/// [`ConsistencyError`] leaving the handle untouched.
enum Resolution<T> {
    /// Nothing decided yet: the task is not scheduled and no outcome was set.
    Unset,
    /// Resolved on the handle itself; no attempt will ever be bound.
    Direct,
    /// Resolved by delegating to the engine's current attempt.
    Delegated {
        current: SharedAttempt<T>,
        /// Immediately prior attempt, kept for diagnostics only.
        previous: Option<SharedAttempt<T>>,
    },
}

struct Inner<T> {
    resolution: Resolution<T>,
    /// The handle's own terminal slot: authoritative on the direct path,
    /// a write-only mirror of the finished attempt otherwise.
    terminal: TerminalState<T>,
    outputs: Vec<OutputArtifact>,
}

struct Shared<T> {
    task_id: Option<TaskId>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    inner: Mutex<Inner<T>>,
    /// Advances on every bind, rebind, and direct resolution.
    signal: RebindSignal,
}

/// What a `result` call found when it snapshotted the handle.
enum ResultSource<T> {
    /// An attempt is bound; wait on it.
    Attempt(SharedAttempt<T>),
    /// A direct outcome is recorded.
    Ready(Result<TaskPayload<T>, TaskError>),
    /// Nothing to wait on yet.
    Unresolved,
}

/// Handle to the eventual outcome of a task.
///
/// Cheaply cloneable; the engine and any number of joining callers share
/// clones of the same handle. All blocking entry points take an optional
/// timeout that bounds each individual wait, not the whole retry loop.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> TaskHandle<T> {
    /// Create a handle, optionally pre-bound to a first attempt.
    ///
    /// Pass `None` for `attempt` when the task is not yet scheduled; the
    /// engine binds one later with [`TaskHandle::bind_attempt`].
    pub fn new(
        attempt: Option<SharedAttempt<T>>,
        task_id: Option<TaskId>,
        stdout: Option<PathBuf>,
        stderr: Option<PathBuf>,
    ) -> Self {
        let handle = Self {
            shared: Arc::new(Shared {
                task_id,
                stdout,
                stderr,
                inner: Mutex::new(Inner {
                    resolution: Resolution::Unset,
                    terminal: TerminalState::Pending,
                    outputs: Vec::new(),
                }),
                signal: RebindSignal::new(),
            }),
        };
        if let Some(attempt) = attempt {
            let first_bind = handle.bind_attempt(attempt);
            debug_assert!(first_bind.is_ok());
        }
        handle
    }

    /// Create an unbound handle with no stdio paths.
    pub fn unbound(task_id: Option<TaskId>) -> Self {
        Self::new(None, task_id, None, None)
    }

    /// Bind the first attempt, or replace the current one on retry.
    ///
    /// Replacing the attempt moves the old one into the diagnostics-only
    /// `previous` slot, attaches the outcome mirror to the new attempt, and
    /// wakes every waiter parked on the rebind signal. Binding is rejected
    /// when the handle was resolved directly, or when the current attempt
    /// already resolved finally (done with no retries pending).
    pub fn bind_attempt(&self, attempt: SharedAttempt<T>) -> Result<(), ConsistencyError> {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            match &mut inner.resolution {
                Resolution::Unset => {
                    inner.resolution = Resolution::Delegated {
                        current: attempt.clone(),
                        previous: None,
                    };
                }
                Resolution::Delegated { current, previous } => {
                    if current.done() && current.retries_left() == 0 {
                        error!(
                            task_id = ?self.shared.task_id,
                            violation = %ConsistencyError::RebindAfterFinal,
                            "rejecting rebind"
                        );
                        return Err(ConsistencyError::RebindAfterFinal);
                    }
                    *previous = Some(current.clone());
                    *current = attempt.clone();
                }
                Resolution::Direct => {
                    error!(
                        task_id = ?self.shared.task_id,
                        violation = %ConsistencyError::AlreadyDirect,
                        "rejecting bind"
                    );
                    return Err(ConsistencyError::AlreadyDirect);
                }
            }
        }
        Self::attach_mirror(&self.shared, &attempt);
        let generation = self.shared.signal.advance();
        debug!(task_id = ?self.shared.task_id, generation, "attempt bound");
        Ok(())
    }

    /// Resolve the handle directly with a value.
    ///
    /// Only valid while no attempt was ever bound and no direct outcome was
    /// recorded; the handle then never delegates.
    pub fn set_result(&self, value: T) -> Result<(), ConsistencyError> {
        self.set_terminal(TerminalState::Succeeded(TaskPayload::Value(value)))
    }

    /// Resolve the handle directly with a failure.
    pub fn set_fail(&self, error: TaskError) -> Result<(), ConsistencyError> {
        self.set_terminal(TerminalState::Failed(error))
    }

    fn set_terminal(&self, outcome: TerminalState<T>) -> Result<(), ConsistencyError> {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            match &inner.resolution {
                Resolution::Unset => {}
                Resolution::Direct => {
                    error!(
                        task_id = ?self.shared.task_id,
                        violation = %ConsistencyError::AlreadyResolved,
                        "rejecting direct outcome"
                    );
                    return Err(ConsistencyError::AlreadyResolved);
                }
                Resolution::Delegated { .. } => {
                    error!(
                        task_id = ?self.shared.task_id,
                        violation = %ConsistencyError::AlreadyDelegated,
                        "rejecting direct outcome"
                    );
                    return Err(ConsistencyError::AlreadyDelegated);
                }
            }
            inner.resolution = Resolution::Direct;
            inner.terminal = outcome;
        }
        self.shared.signal.advance();
        debug!(task_id = ?self.shared.task_id, "handle resolved directly");
        Ok(())
    }

    /// Block for the task's value.
    ///
    /// With an attempt bound, waits on it; on a failure with retries
    /// remaining, parks on the rebind signal and retries against the
    /// replacement attempt until a final outcome lands. With no attempt
    /// bound, waits for a direct resolution or a late bind. Remote-failure
    /// wrappers are unwrapped to their cause on the way out.
    ///
    /// `timeout` bounds each individual wait: a caller with a short budget
    /// can observe [`WaitError::Timeout`] even though a later retry would
    /// have succeeded.
    pub fn result(&self, timeout: Option<Duration>) -> Result<T, WaitError> {
        loop {
            // Capture the generation before snapshotting: a rebind landing
            // after the capture makes the wait below return immediately.
            let seen = self.shared.signal.generation();
            let source = {
                let inner = self.shared.inner.lock().unwrap();
                match &inner.resolution {
                    Resolution::Delegated { current, .. } => {
                        ResultSource::Attempt(current.clone())
                    }
                    _ => match &inner.terminal {
                        TerminalState::Pending => ResultSource::Unresolved,
                        TerminalState::Succeeded(payload) => {
                            ResultSource::Ready(Ok(payload.clone()))
                        }
                        TerminalState::Failed(err) => ResultSource::Ready(Err(err.clone())),
                    },
                }
            };
            match source {
                ResultSource::Ready(Ok(TaskPayload::Value(value))) => return Ok(value),
                ResultSource::Ready(Ok(TaskPayload::Remote(remote))) => {
                    return Err(WaitError::Failed(remote.into_cause()))
                }
                ResultSource::Ready(Err(err)) => {
                    return Err(WaitError::Failed(err.into_cause()))
                }
                ResultSource::Unresolved => {
                    debug!(
                        task_id = ?self.shared.task_id,
                        "no attempt bound; waiting for direct outcome or bind"
                    );
                    self.shared.signal.wait_past(seen, timeout)?;
                }
                ResultSource::Attempt(attempt) => match attempt.result(timeout) {
                    Ok(TaskPayload::Value(value)) => return Ok(value),
                    Ok(TaskPayload::Remote(remote)) => {
                        return Err(WaitError::Failed(remote.into_cause()))
                    }
                    Err(WaitError::Timeout) => return Err(WaitError::Timeout),
                    Err(WaitError::Failed(err)) => {
                        let retries_left = attempt.retries_left();
                        if retries_left == 0 {
                            return Err(WaitError::Failed(err.into_cause()));
                        }
                        debug!(
                            task_id = ?self.shared.task_id,
                            retries_left,
                            "attempt failed; waiting for rebind"
                        );
                        self.shared.signal.wait_past(seen, timeout)?;
                    }
                },
            }
        }
    }

    /// Block for the task's failure, if any.
    ///
    /// Pure forwarding: with an attempt bound this is the attempt's error
    /// channel verbatim (no unwrapping); with none bound there is no
    /// exception available and this returns `Ok(None)` without consulting
    /// the handle's own slot.
    pub fn error(&self, timeout: Option<Duration>) -> Result<Option<TaskError>, WaitError> {
        match self.current_attempt() {
            Some(attempt) => attempt.error(timeout),
            None => Ok(None),
        }
    }

    /// True once the current attempt reached a terminal state.
    ///
    /// A handle with no bound attempt always reports `false` — including a
    /// handle resolved directly. Once an attempt exists it is the sole
    /// source of truth for status; the handle's own slot is never consulted.
    pub fn done(&self) -> bool {
        self.current_attempt().map_or(false, |a| a.done())
    }

    /// True while the current attempt is executing; `false` when unbound.
    pub fn running(&self) -> bool {
        self.current_attempt().map_or(false, |a| a.running())
    }

    /// True if the current attempt was cancelled; `false` when unbound.
    pub fn cancelled(&self) -> bool {
        self.current_attempt().map_or(false, |a| a.cancelled())
    }

    /// Request cancellation of the current attempt and report its answer.
    ///
    /// Cancellation is impossible while no attempt is bound; that returns
    /// `false`. Only the currently bound attempt is cancelled, never a
    /// replaced predecessor.
    pub fn cancel(&self) -> bool {
        match self.current_attempt() {
            Some(attempt) => attempt.cancel(),
            None => false,
        }
    }

    /// Register a completion callback on the current attempt.
    ///
    /// With no attempt bound the handle has nothing to notify on; that is a
    /// caller error, reported rather than silently dropped.
    pub fn on_done(&self, callback: DoneCallback<T>) -> Result<(), NoDelegateError> {
        match self.current_attempt() {
            Some(attempt) => {
                attempt.on_done(callback);
                Ok(())
            }
            None => {
                warn!(
                    task_id = ?self.shared.task_id,
                    "discarding completion callback: no attempt bound"
                );
                Err(NoDelegateError)
            }
        }
    }

    /// Task identifier, if one was attached.
    pub fn task_id(&self) -> Option<&TaskId> {
        self.shared.task_id.as_ref()
    }

    /// Stdout file of the task, if redirected.
    pub fn stdout(&self) -> Option<&Path> {
        self.shared.stdout.as_deref()
    }

    /// Stderr file of the task, if redirected.
    pub fn stderr(&self) -> Option<&Path> {
        self.shared.stderr.as_deref()
    }

    /// Ordered output artifacts registered by the engine so far.
    pub fn outputs(&self) -> Vec<OutputArtifact> {
        self.shared.inner.lock().unwrap().outputs.clone()
    }

    /// Engine hook: append an output artifact.
    pub fn push_output(&self, artifact: OutputArtifact) {
        self.shared.inner.lock().unwrap().outputs.push(artifact);
    }

    /// Coarse lifecycle state for logs and representations.
    ///
    /// Derived from the bound attempt when one exists, otherwise from the
    /// handle's own terminal slot.
    pub fn state(&self) -> HandleState {
        let inner = self.shared.inner.lock().unwrap();
        match &inner.resolution {
            Resolution::Delegated { current, .. } => {
                if current.cancelled() {
                    HandleState::Cancelled
                } else if current.done() {
                    HandleState::Finished
                } else if current.running() {
                    HandleState::Running
                } else {
                    HandleState::Pending
                }
            }
            _ => inner.terminal.label(),
        }
    }

    fn current_attempt(&self) -> Option<SharedAttempt<T>> {
        let inner = self.shared.inner.lock().unwrap();
        match &inner.resolution {
            Resolution::Delegated { current, .. } => Some(current.clone()),
            _ => None,
        }
    }

    /// Attach the outcome mirror to a freshly bound attempt.
    ///
    /// When the attempt finishes, its outcome is copied into the handle's
    /// own terminal slot for diagnostics. The mirror checks it fired for the
    /// attempt still bound; a fire from a replaced attempt is reported and
    /// ignored, never written.
    fn attach_mirror(shared: &Arc<Shared<T>>, attempt: &SharedAttempt<T>) {
        let weak_shared: Weak<Shared<T>> = Arc::downgrade(shared);
        let weak_attempt: Weak<dyn AttemptFuture<T>> = Arc::downgrade(attempt);
        attempt.on_done(Box::new(move |outcome| {
            let shared = match weak_shared.upgrade() {
                Some(shared) => shared,
                None => return,
            };
            let mut inner = shared.inner.lock().unwrap();
            let fired_for_current = match (&inner.resolution, weak_attempt.upgrade()) {
                (Resolution::Delegated { current, .. }, Some(fired)) => {
                    Arc::ptr_eq(current, &fired)
                }
                _ => false,
            };
            if !fired_for_current {
                warn!(
                    task_id = ?shared.task_id,
                    violation = %ConsistencyError::StaleCallback,
                    "ignoring outcome mirror"
                );
                return;
            }
            inner.terminal = match outcome {
                Ok(payload) => TerminalState::Succeeded(payload.clone()),
                Err(err) => TerminalState::Failed(err.clone()),
            };
        }));
    }
}

impl<T: Clone + Send + 'static> fmt::Display for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TaskHandle ")?;
        match &self.shared.task_id {
            Some(id) => write!(f, "{}", id)?,
            None => write!(f, "anonymous")?,
        }
        let state = self.state();
        write!(f, " state={}", state)?;
        if state.is_terminal() {
            let inner = self.shared.inner.lock().unwrap();
            match &inner.terminal {
                TerminalState::Succeeded(TaskPayload::Value(_)) => {
                    write!(f, " returned {}", std::any::type_name::<T>())?
                }
                TerminalState::Succeeded(TaskPayload::Remote(_)) => {
                    write!(f, " raised remote-failure")?
                }
                TerminalState::Failed(err) => write!(f, " raised {}", err.kind())?,
                TerminalState::Pending => {}
            }
        }
        write!(f, ">")
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.shared.task_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::CompletableAttempt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use taskflow_core::RemoteFailure;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn attempt(retries: u32) -> Arc<CompletableAttempt<i32>> {
        Arc::new(CompletableAttempt::new(retries))
    }

    fn boom() -> TaskError {
        TaskError::execution_failed("boom", 1)
    }

    #[test]
    fn test_unbound_handle_reports_inactive() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        assert!(!handle.done());
        assert!(!handle.running());
        assert!(!handle.cancelled());
        assert_eq!(handle.state(), HandleState::Pending);
        assert_eq!(handle.to_string(), "<TaskHandle anonymous state=pending>");
    }

    #[test]
    fn test_bound_attempt_success() {
        let first = attempt(0);
        let handle = TaskHandle::new(
            Some(first.clone() as SharedAttempt<i32>),
            Some(TaskId::new("task-5")),
            None,
            None,
        );
        assert!(!handle.done());

        first.mark_running();
        assert!(handle.running());

        first.complete_value(11);
        assert_eq!(handle.result(None), Ok(11));
        assert!(handle.done());
        assert_eq!(handle.state(), HandleState::Finished);
    }

    #[test]
    fn test_failure_without_retries_raises_unwrapped_cause() {
        let first = attempt(0);
        let handle = TaskHandle::unbound(None);
        handle.bind_attempt(first.clone()).unwrap();

        first.fail(TaskError::Remote(RemoteFailure::with_origin(
            boom(),
            "worker-3",
        )));
        assert_eq!(handle.result(None), Err(WaitError::Failed(boom())));
    }

    #[test]
    fn test_remote_failure_on_success_channel_is_unwrapped() {
        let first = attempt(0);
        let handle = TaskHandle::unbound(None);
        handle.bind_attempt(first.clone()).unwrap();

        first.complete(TaskPayload::Remote(RemoteFailure::new(boom())));
        assert_eq!(handle.result(None), Err(WaitError::Failed(boom())));
    }

    #[test]
    fn test_waiter_survives_retry() {
        init_tracing();
        let first = attempt(2);
        let handle = TaskHandle::new(
            Some(first.clone() as SharedAttempt<i32>),
            Some(TaskId::generate()),
            None,
            None,
        );

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.result(None))
        };

        thread::sleep(Duration::from_millis(50));
        first.fail(boom());
        thread::sleep(Duration::from_millis(50));

        let second = attempt(1);
        handle.bind_attempt(second.clone()).unwrap();
        second.complete_value(42);

        assert_eq!(waiter.join().unwrap(), Ok(42));
    }

    #[test]
    fn test_direct_result_then_bind_is_violation() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        handle.set_result(5).unwrap();

        let late = attempt(0);
        assert_eq!(
            handle.bind_attempt(late),
            Err(ConsistencyError::AlreadyDirect)
        );
        // The previously set result is still the one observed.
        assert_eq!(handle.result(None), Ok(5));
    }

    #[test]
    fn test_concurrent_waiters_observe_single_rebind() {
        init_tracing();
        let first = attempt(1);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);

        let mut waiters = Vec::new();
        for _ in 0..2 {
            let handle = handle.clone();
            waiters.push(thread::spawn(move || {
                handle.result(Some(Duration::from_secs(5)))
            }));
        }

        thread::sleep(Duration::from_millis(50));
        first.fail(boom());
        thread::sleep(Duration::from_millis(50));

        let second = attempt(0);
        handle.bind_attempt(second.clone()).unwrap();
        second.complete_value(42);

        // Neither waiter may time out: the wake is broadcast, not consumed.
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(42));
        }
    }

    #[test]
    fn test_retry_scenario() {
        let first = attempt(1);
        let handle = TaskHandle::new(
            Some(first.clone() as SharedAttempt<i32>),
            Some(TaskId::from(7u64)),
            None,
            None,
        );

        first.fail(TaskError::Remote(RemoteFailure::new(boom())));

        let second = attempt(0);
        handle.bind_attempt(second.clone()).unwrap();
        second.complete_value(42);

        assert_eq!(handle.result(None), Ok(42));
        assert_eq!(handle.task_id(), Some(&TaskId::new("7")));
    }

    #[test]
    fn test_callback_on_unbound_handle_is_an_error() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(Some(TaskId::from(1u64)));
        let result = handle.on_done(Box::new(|_| {}));
        assert_eq!(result, Err(NoDelegateError));
    }

    #[test]
    fn test_forwarded_done_callback_fires() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        handle
            .on_done(Box::new(move |outcome| {
                assert!(outcome.is_ok());
                flag.store(true, Ordering::SeqCst);
            }))
            .unwrap();

        first.complete_value(1);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_unbound_is_impossible() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        assert!(!handle.cancel());
    }

    #[test]
    fn test_cancel_forwards_to_current_attempt() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        assert!(handle.cancel());
        assert!(handle.cancelled());
        assert_eq!(handle.state(), HandleState::Cancelled);
    }

    #[test]
    fn test_cancel_running_attempt_is_refused() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        first.mark_running();
        assert!(!handle.cancel());
        assert!(!handle.cancelled());
    }

    #[test]
    fn test_direct_fail_and_double_set() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        handle.set_fail(boom()).unwrap();
        assert_eq!(handle.result(None), Err(WaitError::Failed(boom())));
        assert_eq!(
            handle.set_result(1),
            Err(ConsistencyError::AlreadyResolved)
        );
    }

    #[test]
    fn test_direct_set_after_bind_is_violation() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        assert_eq!(
            handle.set_result(1),
            Err(ConsistencyError::AlreadyDelegated)
        );
        first.complete_value(9);
        assert_eq!(handle.result(None), Ok(9));
    }

    #[test]
    fn test_timeout_bounds_each_wait_not_the_retry_loop() {
        let first = attempt(1);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        first.fail(boom());

        // Retries remain, so the caller parks on the rebind signal; the
        // per-attempt budget elapses before any rebind arrives.
        let result = handle.result(Some(Duration::from_millis(50)));
        assert_eq!(result, Err(WaitError::Timeout));
    }

    #[test]
    fn test_unbound_result_times_out() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        let result = handle.result(Some(Duration::from_millis(20)));
        assert_eq!(result, Err(WaitError::Timeout));
    }

    #[test]
    fn test_late_bind_wakes_unbound_waiter() {
        init_tracing();
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.result(Some(Duration::from_secs(5))))
        };

        thread::sleep(Duration::from_millis(50));
        let first = attempt(0);
        handle.bind_attempt(first.clone()).unwrap();
        first.complete_value(3);

        assert_eq!(waiter.join().unwrap(), Ok(3));
    }

    #[test]
    fn test_rebind_after_final_resolution_is_violation() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        first.complete_value(1);

        let second = attempt(0);
        assert_eq!(
            handle.bind_attempt(second),
            Err(ConsistencyError::RebindAfterFinal)
        );
    }

    #[test]
    fn test_stale_mirror_callback_is_ignored() {
        let first = attempt(1);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);

        let second = attempt(0);
        handle.bind_attempt(second.clone()).unwrap();

        // The replaced attempt finishing must not touch the handle's slot.
        first.complete_value(99);
        {
            let inner = handle.shared.inner.lock().unwrap();
            assert!(inner.terminal.is_pending());
        }

        second.complete_value(42);
        {
            let inner = handle.shared.inner.lock().unwrap();
            assert!(matches!(
                inner.terminal,
                TerminalState::Succeeded(TaskPayload::Value(42))
            ));
        }
    }

    #[test]
    fn test_display_reports_finished_value_type() {
        let first = attempt(0);
        let handle = TaskHandle::new(
            Some(first.clone() as SharedAttempt<i32>),
            Some(TaskId::new("task-7")),
            None,
            None,
        );
        first.complete_value(42);
        // The mirror has run synchronously by now.
        let repr = handle.to_string();
        assert!(repr.contains("task-7"), "repr was {repr}");
        assert!(repr.contains("state=finished"), "repr was {repr}");
        assert!(repr.contains("returned i32"), "repr was {repr}");
    }

    #[test]
    fn test_display_reports_error_category() {
        let first = attempt(0);
        let handle = TaskHandle::new(Some(first.clone() as SharedAttempt<i32>), None, None, None);
        first.fail(TaskError::WalltimeExceeded {
            reason: "exceeded 60s".to_owned(),
        });
        let repr = handle.to_string();
        assert!(repr.contains("state=finished"), "repr was {repr}");
        assert!(repr.contains("raised walltime-exceeded"), "repr was {repr}");
        // The error channel forwards the attempt's failure verbatim.
        assert_eq!(
            handle.error(None),
            Ok(Some(TaskError::WalltimeExceeded {
                reason: "exceeded 60s".to_owned(),
            }))
        );
    }

    #[test]
    fn test_error_is_none_when_unbound() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(None);
        assert_eq!(handle.error(None), Ok(None));
    }

    #[test]
    fn test_outputs_keep_engine_order() {
        let handle: TaskHandle<i32> = TaskHandle::unbound(Some(TaskId::new("task-9")));
        let id = handle.task_id().unwrap().clone();
        handle.push_output(OutputArtifact::new(id.clone(), "/tmp/a.out"));
        handle.push_output(OutputArtifact::new(id, "/tmp/b.out"));

        let outputs = handle.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].path(), Path::new("/tmp/a.out"));
        assert_eq!(outputs[1].path(), Path::new("/tmp/b.out"));
    }

    #[test]
    fn test_stdio_paths_are_exposed() {
        let handle: TaskHandle<i32> = TaskHandle::new(
            None,
            Some(TaskId::new("task-3")),
            Some(PathBuf::from("/tmp/task-3.out")),
            Some(PathBuf::from("/tmp/task-3.err")),
        );
        assert_eq!(handle.stdout(), Some(Path::new("/tmp/task-3.out")));
        assert_eq!(handle.stderr(), Some(Path::new("/tmp/task-3.err")));
    }
}
