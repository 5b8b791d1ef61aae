//! Outcome types shared between attempts and handles.

use crate::error::{RemoteFailure, TaskError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value produced on an attempt's success channel.
///
/// Workers serialize failures that occur inside the execution context and
/// ship them back as the attempt's "result", so a successful wait can still
/// yield a failure that must be unwrapped and raised locally.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload<T> {
    /// The task's computed value.
    Value(T),
    /// A remote failure delivered through the success channel.
    Remote(RemoteFailure),
}

impl<T> TaskPayload<T> {
    /// True if this payload is a wrapped remote failure rather than a value.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl<T> From<T> for TaskPayload<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

/// A handle's own terminal outcome slot.
///
/// Written exactly once on the direct resolution path, or mirrored from the
/// finished attempt on the delegated path (diagnostics only in that case).
#[derive(Debug, Clone)]
pub enum TerminalState<T> {
    /// No outcome recorded yet.
    Pending,
    /// A payload was recorded.
    Succeeded(TaskPayload<T>),
    /// A failure was recorded.
    Failed(TaskError),
}

impl<T> TerminalState<T> {
    /// True while no outcome has been recorded.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Coarse state label for this slot, used when no attempt is bound.
    pub fn label(&self) -> HandleState {
        match self {
            Self::Pending => HandleState::Pending,
            Self::Failed(TaskError::Cancelled) => HandleState::Cancelled,
            Self::Succeeded(_) | Self::Failed(_) => HandleState::Finished,
        }
    }
}

/// Coarse lifecycle state of a task handle, for logs and representations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    /// Not yet scheduled, or scheduled but not started.
    #[default]
    Pending,
    /// The current attempt is executing.
    Running,
    /// The current attempt was cancelled.
    Cancelled,
    /// A terminal outcome exists.
    Finished,
}

impl HandleState {
    /// Returns true if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Finished)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Finished => "finished",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_value() {
        let payload = TaskPayload::from(42);
        assert_eq!(payload, TaskPayload::Value(42));
        assert!(!payload.is_remote_failure());
    }

    #[test]
    fn test_remote_payload_is_flagged() {
        let payload: TaskPayload<i32> =
            TaskPayload::Remote(RemoteFailure::new(TaskError::Cancelled));
        assert!(payload.is_remote_failure());
    }

    #[test]
    fn test_terminal_state_labels() {
        let pending: TerminalState<i32> = TerminalState::Pending;
        assert!(pending.is_pending());
        assert_eq!(pending.label(), HandleState::Pending);

        let succeeded = TerminalState::Succeeded(TaskPayload::Value(1));
        assert_eq!(succeeded.label(), HandleState::Finished);

        let cancelled: TerminalState<i32> = TerminalState::Failed(TaskError::Cancelled);
        assert_eq!(cancelled.label(), HandleState::Cancelled);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(HandleState::Pending.to_string(), "pending");
        assert_eq!(HandleState::Finished.to_string(), "finished");
        assert!(HandleState::Finished.is_terminal());
        assert!(!HandleState::Running.is_terminal());
    }
}
