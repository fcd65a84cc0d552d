//! Error types for the bombard engine
//!
//! Construction-time misconfiguration is the only class of error that can
//! prevent a run from starting. Per-request failures are not errors in this
//! sense: they are classified into a [`FailureKind`] by the request executor
//! and recorded into the statistics aggregator without ever aborting the
//! dispatch loop.
//!
//! [`FailureKind`]: crate::core::executor::FailureKind

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that prevent an engine from being built or started
#[derive(Error, Debug)]
pub enum EngineError {
    /// Target rate must be a positive, finite number of requests per second
    #[error("invalid target rate {0} req/s (must be finite and > 0)")]
    InvalidRate(f64),

    /// Concurrency cap must admit at least one in-flight request
    #[error("invalid concurrency cap {0} (must be >= 1)")]
    InvalidConcurrency(usize),

    /// Coordinate space must contain at least one point
    #[error("invalid max coordinate {0} (must be >= 1)")]
    InvalidMaxCoord(u32),

    /// Per-request timeout must be non-zero
    #[error("invalid request timeout (must be > 0)")]
    InvalidTimeout,

    /// The underlying HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// `start()` was called on an engine that is already running or paused
    #[error("engine already started")]
    AlreadyStarted,

    /// `start()` was called on a stopped engine; Stop is terminal and a new
    /// run requires a new engine instance
    #[error("engine is stopped; create a new engine instance for a new run")]
    Stopped,
}
