use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PlatformError {
    /// The process is running on an OS this system has no behavior for.
    /// Fatal at startup - no downstream component can operate without a
    /// resolved platform.
    #[error("Unsupported Platform Error: {message} {location}")]
    Unsupported {
        message: String,
        location: ErrorLocation,
    },
}
