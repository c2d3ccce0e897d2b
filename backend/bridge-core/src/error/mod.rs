pub mod bridge;
pub mod client;
pub mod config;
pub mod paths;
pub mod platform;
pub mod registry;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Platform(#[from] platform::PlatformError),

    #[error(transparent)]
    Paths(#[from] paths::PathError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    #[error(transparent)]
    Server(#[from] server::ServerError),

    #[error(transparent)]
    Client(#[from] client::ClientError),

    #[error(transparent)]
    Bridge(#[from] bridge::BridgeError),
}
