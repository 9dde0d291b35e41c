//! Failure taxonomy shared by the event queue, the process scheduler and the
//! resource primitives.
//!
//! All variants indicate caller bugs or explicit non-blocking refusals; the
//! kernel never retries on behalf of the caller.

use thiserror::Error;

use crate::process::{Interrupt, ProcessId};

/// Errors produced by kernel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// An event was scheduled with a negative delay.
    #[error("negative delays are not allowed")]
    InvalidSchedule,
    /// An event was triggered (or scheduled for triggering) twice.
    #[error("event has already been triggered")]
    AlreadyTriggered,
    /// A non-blocking put/get cannot be satisfied, or a blocking request can
    /// never be satisfied (e.g. a container get larger than the capacity).
    #[error("operation exceeds capacity")]
    CapacityExceeded,
    /// Cancellation of a request that was already granted or is unknown.
    #[error("request was already granted or is unknown")]
    InvalidCancellation,
    /// Release of a resource by a handle that does not hold it.
    #[error("handle does not hold the resource")]
    InvalidRelease,
    /// Interruption of a process that is not currently suspended, under the
    /// strict interrupt policy.
    #[error("process is not suspended")]
    NotInterruptible,
}

/// Terminal outcome of a process body.
///
/// Bodies return `Result<(), ProcessError>`; both unhandled interrupts and
/// kernel errors propagate with `?`.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    /// The body let an [`Interrupt`] propagate instead of handling it.
    #[error("unhandled interrupt")]
    Interrupted(Interrupt),
    /// A kernel operation failed inside the body.
    #[error(transparent)]
    Kernel(#[from] SimError),
    /// A failure described by the simulated logic itself.
    #[error("{0}")]
    Message(String),
}

impl ProcessError {
    /// Shorthand for a [`ProcessError::Message`] failure.
    pub fn msg(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

impl From<Interrupt> for ProcessError {
    fn from(interrupt: Interrupt) -> Self {
        Self::Interrupted(interrupt)
    }
}

/// A failed process, as aggregated by the simulation for the run caller.
#[derive(Debug, Clone)]
pub struct ProcessFailure {
    /// Identifier of the failed process.
    pub process: ProcessId,
    /// Name the process was spawned with.
    pub name: String,
    /// The error the body completed with.
    pub error: ProcessError,
}
