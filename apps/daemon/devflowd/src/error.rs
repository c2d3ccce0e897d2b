use common::ErrorLocation;

use thiserror::Error;

/// Errors that can occur while bringing up or running the daemon.
#[derive(Debug, Error)]
pub enum DevflowdError {
    /// Startup wiring failure (log directory, logger, platform detection)
    #[error("Devflowd Error: {message} {location}")]
    Devflowd {
        message: String,
        location: ErrorLocation,
    },

    /// Error from bridge-core operations (serving, config)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}
