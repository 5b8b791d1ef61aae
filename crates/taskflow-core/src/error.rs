//! Task failure taxonomy.
//!
//! `TaskError` is the terminal failure of a task attempt as seen by callers
//! joining on a handle. Failures that occurred inside the execution context
//! arrive wrapped in a [`RemoteFailure`] carrying enough information to be
//! re-raised locally; the future layer unwraps the wrapper once retries are
//! exhausted so callers always see the underlying cause.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terminal failure of a task attempt.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum TaskError {
    /// The attempt ran and exited unsuccessfully.
    #[error("execution failed: {reason} (exit code {exit_code})")]
    ExecutionFailed { reason: String, exit_code: i32 },

    /// The attempt exceeded its allotted walltime and was torn down.
    #[error("walltime exceeded: {reason}")]
    WalltimeExceeded { reason: String },

    /// The attempt finished but expected output artifacts never materialized.
    #[error("missing outputs {missing:?}: {reason}")]
    MissingOutputs { reason: String, missing: Vec<String> },

    /// An upstream dependency failed, so the attempt never ran.
    #[error("dependency failed: {reason}")]
    DependencyFailed { reason: String },

    /// The attempt was cancelled before producing an outcome.
    #[error("cancelled")]
    Cancelled,

    /// A failure captured in the remote execution context.
    #[error("remote failure: {0}")]
    Remote(RemoteFailure),
}

impl TaskError {
    /// Short category label used in diagnostics and handle representations.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionFailed { .. } => "execution-failed",
            Self::WalltimeExceeded { .. } => "walltime-exceeded",
            Self::MissingOutputs { .. } => "missing-outputs",
            Self::DependencyFailed { .. } => "dependency-failed",
            Self::Cancelled => "cancelled",
            Self::Remote(_) => "remote-failure",
        }
    }

    /// Strip any remote-failure wrapping and return the underlying cause.
    ///
    /// Identity for errors that are not wrapped.
    pub fn into_cause(self) -> TaskError {
        match self {
            Self::Remote(remote) => remote.into_cause(),
            other => other,
        }
    }

    /// Convenience constructor for the common execution-failure case.
    pub fn execution_failed(reason: impl Into<String>, exit_code: i32) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
            exit_code,
        }
    }
}

/// A failure that occurred in the remote execution context.
///
/// Carries the underlying [`TaskError`] plus the origin host so the cause can
/// be re-raised locally without losing where it happened. Remote failures
/// travel on either channel: as a payload on the success channel (the worker
/// shipped the failure back as its "result") or wrapped inside
/// [`TaskError::Remote`] on the error channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFailure {
    cause: Box<TaskError>,
    origin: Option<String>,
}

impl RemoteFailure {
    /// Wrap a cause with no origin information.
    pub fn new(cause: TaskError) -> Self {
        Self {
            cause: Box::new(cause),
            origin: None,
        }
    }

    /// Wrap a cause captured on a named worker host.
    pub fn with_origin(cause: TaskError, origin: impl Into<String>) -> Self {
        Self {
            cause: Box::new(cause),
            origin: Some(origin.into()),
        }
    }

    /// The underlying cause.
    pub fn cause(&self) -> &TaskError {
        &self.cause
    }

    /// Host the failure was captured on, if recorded.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Re-raise locally: consume the wrapper and return the underlying cause,
    /// unwrapping nested wrappers as well.
    pub fn into_cause(self) -> TaskError {
        match *self.cause {
            TaskError::Remote(inner) => inner.into_cause(),
            cause => cause,
        }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} (from {})", self.cause, origin),
            None => write!(f, "{}", self.cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskError::execution_failed("boom", 1);
        assert_eq!(format!("{}", err), "execution failed: boom (exit code 1)");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(TaskError::Cancelled.kind(), "cancelled");
        let remote = TaskError::Remote(RemoteFailure::new(TaskError::Cancelled));
        assert_eq!(remote.kind(), "remote-failure");
    }

    #[test]
    fn test_into_cause_unwraps_wrapper() {
        let cause = TaskError::execution_failed("boom", 1);
        let wrapped = TaskError::Remote(RemoteFailure::with_origin(cause.clone(), "worker-3"));
        assert_eq!(wrapped.into_cause(), cause);
    }

    #[test]
    fn test_into_cause_unwraps_nested_wrappers() {
        let cause = TaskError::WalltimeExceeded {
            reason: "exceeded 60s".to_owned(),
        };
        let nested = TaskError::Remote(RemoteFailure::new(TaskError::Remote(RemoteFailure::new(
            cause.clone(),
        ))));
        assert_eq!(nested.into_cause(), cause);
    }

    #[test]
    fn test_into_cause_is_identity_for_plain_errors() {
        let err = TaskError::DependencyFailed {
            reason: "upstream task failed".to_owned(),
        };
        assert_eq!(err.clone().into_cause(), err);
    }

    #[test]
    fn test_remote_failure_display_includes_origin() {
        let remote = RemoteFailure::with_origin(TaskError::Cancelled, "worker-3");
        assert_eq!(format!("{}", remote), "cancelled (from worker-3)");
    }
}
