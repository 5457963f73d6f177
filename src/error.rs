//! Error types for agentic-bench

use thiserror::Error;

use crate::config::ConfigError;

/// Failure of a single dispatched request.
///
/// Dispatch failures are not retried. One uncaught failure aborts the
/// whole run, so every variant is terminal for the benchmark.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// HTTP/transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the endpoint
    #[error("endpoint error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body returned with the error status
        message: String,
    },

    /// Malformed streaming payload
    #[error("malformed stream: {0}")]
    Stream(String),

    /// A trace referenced an agent id with no configured endpoint/model binding
    #[error("no endpoint bound to agent {0}")]
    UnknownAgent(usize),
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum BenchError {
    /// Workload configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request dispatch failure
    #[error("dispatch failure: {0}")]
    Dispatch(#[from] DispatchError),

    /// IO error (e.g. reading a trace file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
