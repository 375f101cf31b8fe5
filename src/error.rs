//! Startup errors for the drainserve binary.

use thiserror::Error;

/// Failures that stop the server before it reaches the running state.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be resolved, read, or parsed
    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    /// The listener could not bind its address
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// OS signal handlers could not be installed
    #[error("signal: {0}")]
    Signal(#[source] std::io::Error),
}
