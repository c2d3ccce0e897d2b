use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RegistryError {
    /// A handler is already registered under this method name. Registration
    /// fails fast instead of silently shadowing the earlier handler.
    #[error("Duplicate Method Error: {method} {location}")]
    DuplicateMethod {
        method: String,
        location: ErrorLocation,
    },
}
