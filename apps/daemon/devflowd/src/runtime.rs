//! Long-lived daemon hosting of the RPC server.
//!
//! Wraps [`RpcServer`] for operation under a service supervisor (systemd
//! unit, launchd job, WSL2 boot service). On a termination signal the
//! runtime stops accepting new connections, gives in-flight requests a
//! bounded grace period, and returns cleanly so the process exits 0 - a
//! supervisor must not mistake a clean shutdown for a crash.
//!
//! The built-in `ping` method is always present (it comes with
//! [`HandlerRegistry::new`]), so external health checks can verify
//! liveness independent of business-logic handlers.

use crate::error::DevflowdError;

use bridge_core::rpc::registry::HandlerRegistry;
use bridge_core::rpc::server::RpcServer;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use log::info;
use tokio::sync::watch;

/// How long in-flight requests may run after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Hosts the RPC server as a daemon.
pub struct ServiceRuntime {
    registry: HandlerRegistry,
}

impl ServiceRuntime {
    /// Wrap a populated registry. Business handlers are registered by the
    /// caller before this point; `ping` is already present.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Serve over TCP until a termination signal arrives.
    ///
    /// Returns `Ok` after a graceful drain so the process exits 0.
    ///
    /// # Errors
    ///
    /// Returns [`DevflowdError::Core`] if the listener cannot bind.
    pub async fn serve_tcp(self, host: &str, port: u16) -> Result<(), DevflowdError> {
        let server = RpcServer::new(self.registry).with_grace(SHUTDOWN_GRACE);

        let mut handle =
            server
                .bind(host, port)
                .await
                .map_err(|e| DevflowdError::Core {
                    message: format!("Failed to start RPC server: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        info!("Daemon ready on {}", handle.local_addr());

        wait_for_termination_signal().await;
        info!("Termination signal received, draining");

        handle.stop().await.map_err(|e| DevflowdError::Core {
            message: format!("Failed to stop RPC server: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("Daemon shut down cleanly");
        Ok(())
    }

    /// Serve a single connection over stdin/stdout (subprocess bridge
    /// mode). Runs until the parent closes our stdin or a termination
    /// signal arrives; both are clean shutdowns, and a signal gives
    /// in-flight requests the same grace period the TCP path gets.
    pub async fn serve_stdio(self) -> Result<(), DevflowdError> {
        let server = RpcServer::new(self.registry).with_grace(SHUTDOWN_GRACE);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            info!("Termination signal received on stdio transport, draining");
            let _ = shutdown_tx.send(true);
        });

        server
            .serve_stdio(shutdown_rx)
            .await
            .map_err(|e| DevflowdError::Core {
                message: format!("Standard stream serving failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Daemon shut down cleanly");
        Ok(())
    }
}

/// Resolve when the process is asked to terminate (ctrl-c everywhere,
/// SIGTERM additionally on unix - what service supervisors send).
async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
