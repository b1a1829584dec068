use thiserror::Error;

/// Error types for dispatch engine operations
///
/// Covers the failure classes the engine can surface to a caller:
/// configuration validation, dispatch-path problems, and shutdown issues.
/// Saturation of the admission path is deliberately *not* here: a dropped
/// call is routine backpressure, counted in the statistics and logged, never
/// an `Err` (see the dispatcher module).
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::{EngineError, Result};
///
/// fn check_workers(count: usize) -> Result<()> {
///     if count == 0 {
///         return Err(EngineError::configuration("worker_count must be at least 1"));
///     }
///     Ok(())
/// }
///
/// match check_workers(0) {
///     Ok(_) => println!("config ok"),
///     Err(EngineError::Configuration(msg)) => println!("bad config: {}", msg),
///     Err(e) => println!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration validation and parsing errors
    ///
    /// Rejected before any pool or worker is built: zero workers, an empty
    /// roster across all tiers, zero durations, and similar bad settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dispatch-path errors
    ///
    /// Problems submitting calls that are not plain saturation, e.g.
    /// dispatching into an engine whose workers have already been shut down.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Shutdown errors
    ///
    /// A worker task failed to join cleanly during engine shutdown.
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// Internal invariant failures
    ///
    /// Unexpected internal state that indicates a bug rather than a
    /// recoverable runtime condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a new Configuration error with the provided message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Dispatch error with the provided message
    pub fn dispatch<S: Into<String>>(msg: S) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Create a new Shutdown error with the provided message
    pub fn shutdown<S: Into<String>>(msg: S) -> Self {
        Self::Shutdown(msg.into())
    }

    /// Create a new Internal error with the provided message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for dispatch engine operations
///
/// Type alias for `std::result::Result<T, EngineError>` used throughout the
/// engine.
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::{Result, EngineError};
///
/// fn parse_tier_count(raw: &str) -> Result<usize> {
///     raw.parse()
///         .map_err(|_| EngineError::configuration(format!("not a count: {raw}")))
/// }
///
/// assert!(parse_tier_count("3").is_ok());
/// assert!(parse_tier_count("three").is_err());
/// ```
pub type Result<T> = std::result::Result<T, EngineError>;
