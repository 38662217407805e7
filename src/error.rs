//! The crate's single error type.
//!
//! Every fallible core API returns `Result<T, EngineError>`. This is the
//! direct counterpart of the teacher's single-variant `IxaError::IxaError(String)`,
//! widened to one variant per taxonomy entry since this crate has no external
//! `ixa` crate to defer formatting and context to.

use thiserror::Error;

/// The error taxonomy of the simulation core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Negative proportions, out-of-range state ids on registration, malformed
    /// parameter lines.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A contact-graph operation was asked to do something the graph cannot
    /// support: a fully disconnected graph on rewire, an edge endpoint outside
    /// `[0, n)`, or mismatched source/target lengths.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A debug-only sanity check failed: a database invariant, a rewire that
    /// changed degree, a back-index mismatch, or a roulette draw that sampled
    /// the same agent twice.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// A requested id (virus, tool, entity, state label, parameter name) is
    /// not registered.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A result or input file could not be opened.
    #[error("I/O failure: {0}")]
    IOFailure(String),

    /// An updater was invoked on an agent in a state it cannot handle, e.g.
    /// the default susceptible-updater called on an agent already carrying a
    /// virus.
    #[error("logic error: {0}")]
    LogicError(String),

    /// A state id passed to an event handler or registration call fell
    /// outside `[0, nstates)`.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A queue-effect code outside the five legal values `{-2,-1,0,1,2}`.
    #[error("invalid queue operation: {0}")]
    InvalidQueueOp(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IOFailure(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::IOFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
