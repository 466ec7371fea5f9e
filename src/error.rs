//! Structured error types for Kairos.
//!
//! Construction-time and scheduling-time failures are returned to the
//! caller as `KernelError`. Failures raised *inside* an event action are
//! never returned from the run loop; they are wrapped in
//! [`KernelError::ActionExecution`], logged, and published on the
//! listener channel while the clock keeps running.

use thiserror::Error;

use crate::event::EventId;

/// The top-level error type for the scheduling kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    // ── Time errors ───────────────────────────────────────

    /// A time value was NaN, overflowed, or is otherwise unrepresentable.
    #[error("invalid simulation time: {0}")]
    InvalidTime(String),

    // ── Scheduling errors ─────────────────────────────────

    /// Attempted to schedule an event before the current simulation time.
    #[error("cannot schedule event at {requested} when current time is {current}")]
    PastScheduling { requested: String, current: String },

    /// `start()` (or a nested run) was requested while the run loop is active.
    #[error("simulator is already running")]
    AlreadyRunning,

    /// An operation is not allowed in the simulator's current run state.
    #[error("cannot {operation} while simulator is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// The same event was inserted into an event list twice.
    #[error("event {0} is already scheduled")]
    DuplicateSchedule(EventId),

    // ── Execution errors ──────────────────────────────────

    /// An event action failed. Contained by the run loop.
    #[error("action of event {event} at {time} failed: {message}")]
    ActionExecution {
        event: EventId,
        time: String,
        message: String,
    },

    // ── Replication / config errors ───────────────────────

    /// The model construction callback failed during `initialize`.
    #[error("model construction failed: {0}")]
    ModelConstruction(String),

    /// A replication configuration is inconsistent.
    #[error("invalid replication: {0}")]
    InvalidReplication(String),

    /// A settings file could not be read, parsed or validated.
    #[error("configuration error: {0}")]
    Config(String),

    // ── Remote errors ─────────────────────────────────────

    /// The simulator behind a remote handle has been dropped.
    #[error("simulator is no longer reachable")]
    SimulatorGone,
}

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;

/// Error type returned by event actions and process bodies.
///
/// Boxed so that models can propagate any error with `?`.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of running a single event action.
pub type ActionResult = Result<(), ActionError>;
