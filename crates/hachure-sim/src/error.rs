//! Kernel error types.

use thiserror::Error;

use crate::time::SimTime;

/// Errors surfaced by the simulation kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// No signal with this name was declared.
    #[error("unknown signal: {name}")]
    UnknownSignal {
        /// Requested signal name.
        name: String,
    },

    /// A signal with this name already exists.
    #[error("signal already declared: {name}")]
    DuplicateSignal {
        /// Conflicting signal name.
        name: String,
    },

    /// The run's simulated-time budget expired before the main task finished.
    #[error("simulated time budget exhausted at {limit}")]
    TimeLimitExceeded {
        /// Absolute time the run was allowed to reach.
        limit: SimTime,
    },

    /// Nothing is scheduled that could ever wake the main task.
    #[error("simulation stalled at {at}: no pending events")]
    Stalled {
        /// Time at which the kernel ran out of events.
        at: SimTime,
    },

    /// The awaited task was cancelled before producing a value.
    #[error("task {name} was cancelled")]
    Cancelled {
        /// Name given to the task at spawn time.
        name: String,
    },

    /// `run` was called from inside a running simulation.
    #[error("simulation is already running")]
    Reentrant,
}

impl SimError {
    /// Returns true if the error means an awaited event never happened.
    ///
    /// Liveness failures are bounded by the simulated-time budget rather
    /// than by per-wait timeouts.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::TimeLimitExceeded { .. } | Self::Stalled { .. })
    }
}

/// Errors from parsing a four-state value string such as `"01xz"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogicParseError {
    /// The string contained no digits.
    #[error("empty logic value")]
    Empty,

    /// A character other than `0`, `1`, `x`, `z` (or `_`) was found.
    #[error("invalid logic character {ch:?} at position {position}")]
    InvalidChar {
        /// Offending character.
        ch: char,
        /// Character index in the input.
        position: usize,
    },

    /// More digits than a [`crate::LogicVec`] can hold.
    #[error("logic value is {width} bits wide, at most {max} supported")]
    TooWide {
        /// Parsed width.
        width: usize,
        /// Supported maximum.
        max: u32,
    },
}
