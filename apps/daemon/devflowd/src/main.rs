use devflowd::error::DevflowdError;
use devflowd::logger::initialize as LoggerInitialize;
use devflowd::runtime::ServiceRuntime;

use bridge_core::config::BridgeConfig;
use bridge_core::paths::PathResolver;
use bridge_core::platform::PlatformProvider;
use bridge_core::rpc::registry::HandlerRegistry;

use common::ErrorLocation;

use std::env::{args, var as env_var};
use std::fs::create_dir_all;
use std::panic::Location;

use log::info;

const STDIO_FLAG: &str = "--stdio";
const PORT_ENV_VAR: &str = "DEVFLOW_DAEMON_PORT";
const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> Result<(), DevflowdError> {
    // Platform detection is fatal on an unrecognized OS: nothing below can
    // operate without a resolved platform.
    let provider = PlatformProvider::detect().map_err(|e| DevflowdError::Core {
        message: format!("Platform detection failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let resolver = PathResolver::new(provider);
    let devflow_home = resolver.devflow_home().map_err(|e| DevflowdError::Core {
        message: format!("Failed to resolve devflow home: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let log_dir = devflow_home.join(LOG_DIR_NAME);
    create_dir_all(&log_dir).map_err(|e| DevflowdError::Devflowd {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    LoggerInitialize(&log_dir)?;

    info!("devflowd starting on {:?}", provider.platform());
    info!("Log directory: {}", log_dir.display());

    // Business command handlers (environments, migrations, secrets,
    // deploys) are registered here by their providers; the registry
    // already carries the built-in ping.
    let registry = HandlerRegistry::new();
    let runtime = ServiceRuntime::new(registry);

    if args().any(|arg| arg == STDIO_FLAG) {
        info!("Serving on standard streams (subprocess bridge mode)");
        return runtime.serve_stdio().await;
    }

    let config = BridgeConfig::load(&devflow_home).map_err(|e| DevflowdError::Core {
        message: format!("Failed to load config: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let port = match env_var(PORT_ENV_VAR) {
        Ok(raw) => raw.parse::<u16>().map_err(|e| DevflowdError::Devflowd {
            message: format!("Invalid {PORT_ENV_VAR} value '{raw}': {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?,
        Err(_) => config.daemon.port,
    };

    info!("Serving on {}:{port}", config.daemon.host);
    runtime.serve_tcp(&config.daemon.host, port).await
}
