//! Error types for babelbox.

use thiserror::Error;

/// Top-level error type for sampling and sandboxed execution.
///
/// Per-candidate runtime errors and timeouts are not errors in this sense;
/// they are expected outcomes carried in
/// [`ExecutionResult`](crate::runner::ExecutionResult).
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid sampling, runner, or experiment configuration.
    /// Surfaced before the run starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// The isolation layer is unusable or failed to start.
    /// Aborts the batch.
    #[error("sandbox failure: {0}")]
    Sandbox(String),

    /// A text is not representable in the alphabet, or an address string
    /// is malformed.
    #[error("address error: {0}")]
    Address(String),

    /// IO error during host-side file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for babelbox operations.
pub type Result<T> = std::result::Result<T, Error>;
