use crate::error::client::ClientError;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BridgeError {
    /// Spawning the control-plane subprocess failed (binary not found on
    /// PATH or next to the current executable, or the OS refused the spawn).
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The spawned child exposed no usable stdio pipes.
    #[error("Pipe Error: {message} {location}")]
    Pipe {
        message: String,
        location: ErrorLocation,
    },

    /// The TCP daemon endpoint stayed unreachable past the retry budget.
    #[error("Unreachable Error: {message} {location}")]
    Unreachable {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
