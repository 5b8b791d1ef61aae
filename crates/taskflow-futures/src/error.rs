//! Errors surfaced by the future layer.

use taskflow_core::TaskError;
use thiserror::Error;

/// Outcome of a blocking wait on a handle or attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaitError {
    /// The bounded wait elapsed before an outcome was available.
    ///
    /// Propagated verbatim; a timeout never consumes a retry.
    #[error("timed out waiting for task outcome")]
    Timeout,

    /// The task reached a terminal failure with no retries left.
    ///
    /// Remote-failure wrappers are already unwrapped to their cause.
    #[error(transparent)]
    Failed(#[from] TaskError),
}

/// A handle was driven down both resolution paths, or an outcome source
/// fired out of protocol.
///
/// A handle resolves through exactly one of two mutually exclusive paths:
/// directly (`set_result`/`set_fail`, no attempt ever bound) or by delegating
/// to the engine's attempts. These errors indicate the engine or a caller
/// broke that protocol; the handle's prior state is always preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// An attempt was bound to a handle already resolved directly.
    #[error("handle already resolved directly; cannot bind an attempt")]
    AlreadyDirect,

    /// A direct outcome was set on a handle that delegates to an attempt.
    #[error("handle delegates to an attempt; cannot set a direct outcome")]
    AlreadyDelegated,

    /// A second direct outcome was set.
    #[error("direct outcome already recorded")]
    AlreadyResolved,

    /// A rebind arrived after the current attempt resolved with no retries
    /// pending.
    #[error("rebind after final resolution")]
    RebindAfterFinal,

    /// A done-callback fired for an attempt that is no longer bound.
    #[error("outcome callback fired for a stale attempt")]
    StaleCallback,
}

/// Registering a completion callback requires a bound attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no attempt bound; the handle has nothing to notify on")]
pub struct NoDelegateError;
