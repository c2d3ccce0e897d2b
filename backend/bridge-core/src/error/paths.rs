use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PathError {
    /// `~` expansion was requested but no home directory could be resolved.
    #[error("Home Directory Error: {message} {location}")]
    NoHomeDir {
        message: String,
        location: ErrorLocation,
    },

    /// A `$VAR` token referenced an environment variable that is not set.
    /// Expansion uses live values only; there is no fallback.
    #[error("Missing Environment Variable Error: {message} {location}")]
    MissingEnvVar {
        message: String,
        location: ErrorLocation,
    },
}
