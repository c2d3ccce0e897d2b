//! Bridge mode selection and lifecycle.
//!
//! The bridge is what lets a UI process invoke control-plane operations:
//! an [`RpcClient`] plus the transport it runs over. Which transport is a
//! platform decision:
//!
//! - Linux, macOS, WSL2: spawn the control plane (`devflowd --stdio`) as a
//!   child and talk over its standard streams. No network exposure.
//! - Windows: the control plane cannot run natively - it lives inside WSL2
//!   as a TCP daemon, reached over a loopback/WSL-reachable endpoint.
//!
//! An explicit override in [`BridgeConfig`] forces either mode. For TCP
//! mode the endpoint that worked is persisted so the UI reconnects across
//! restarts without re-discovering it.
//!
//! The bridge tracks a small state machine the UI can surface:
//! `Stopped -> Starting -> Running`, with `Error` reachable from any state,
//! telling an operator whether to retry connecting, restart the daemon, or
//! re-run platform setup.

use crate::config::{BridgeConfig, DaemonEndpoint};
use crate::error::bridge::BridgeError;
use crate::paths::PathResolver;
use crate::platform::{Platform, PlatformProvider};
use crate::rpc::RpcClient;
use crate::DEVFLOW_DAEMON_BINARY;

use common::ErrorLocation;

use std::env::current_exe;
use std::ffi::OsStr;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::panic::Location;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;
use tokio::time::sleep as TokioSleep;

const STDIO_FLAG: &str = "--stdio";
const CONNECT_MAX_ELAPSED: Duration = Duration::from_secs(10);
const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// How the UI process reaches the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeMode {
    /// Spawn the control plane as a child, frames over its stdio pipes.
    Subprocess,

    /// Connect to a pre-existing TCP daemon (WSL2 or remote host).
    Tcp,
}

/// Bridge lifecycle as surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Starting,
    Running,
    Error,
}

/// Default bridge mode for a platform.
///
/// Windows defaults to TCP because the real control plane runs inside
/// WSL2; every unix-like platform spawns a local subprocess.
pub fn select_mode(platform: Platform) -> BridgeMode {
    if platform.is_windows() {
        BridgeMode::Tcp
    } else {
        BridgeMode::Subprocess
    }
}

/// The UI-side bridge: owns the client, the optional spawned child, and
/// the state machine.
pub struct Bridge {
    provider: PlatformProvider,
    config_dir: PathBuf,
    state: BridgeState,
    mode: Option<BridgeMode>,
    client: Option<RpcClient>,
    child: Option<TokioChild>,
}

impl Bridge {
    /// Create a stopped bridge. `config_dir` is the devflow home directory
    /// holding the persisted [`BridgeConfig`].
    pub fn new(provider: PlatformProvider, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            config_dir: config_dir.into(),
            state: BridgeState::Stopped,
            mode: None,
            client: None,
            child: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// The mode chosen by the last [`Bridge::connect`] attempt.
    pub fn mode(&self) -> Option<BridgeMode> {
        self.mode
    }

    /// The connected client, if the bridge is running.
    pub fn client(&self) -> Option<&RpcClient> {
        self.client.as_ref()
    }

    /// Select a mode, establish the transport, and verify liveness.
    ///
    /// Transitions `Starting -> Running` on success and to `Error` on any
    /// failure; a failed bridge is reusable - `connect()` again retries
    /// from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the config is corrupt, the subprocess
    /// cannot be spawned, the TCP endpoint stays unreachable past the
    /// retry budget, or the initial `ping` fails.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        self.state = BridgeState::Starting;

        match self.establish().await {
            Ok(()) => {
                self.state = BridgeState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = BridgeState::Error;
                self.client = None;
                if let Some(mut child) = self.child.take() {
                    let _ = child.kill().await;
                }
                Err(e)
            }
        }
    }

    /// Close the connection and kill an owned child process.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.disconnect().await;
        }

        if let Some(mut child) = self.child.take() {
            debug!("Killing spawned control plane (PID: {:?})", child.id());
            let _ = child.kill().await;
        }

        self.state = BridgeState::Stopped;
    }

    async fn establish(&mut self) -> Result<(), BridgeError> {
        let config = BridgeConfig::load(&self.config_dir)?;
        let mode = config
            .mode_override
            .unwrap_or_else(|| select_mode(self.provider.platform()));
        self.mode = Some(mode);

        info!("Bridging via {mode:?} mode");

        let client = match mode {
            BridgeMode::Subprocess => self.spawn_subprocess().await?,
            BridgeMode::Tcp => {
                let client = connect_with_retry(&config.daemon).await?;
                // Persist the endpoint that worked so the UI reconnects
                // across restarts without re-discovering it.
                config.save(&self.config_dir)?;
                client
            }
        };

        client
            .call_with_timeout("ping", json!({}), PING_TIMEOUT)
            .await?;
        debug!("Control plane answered ping");

        self.client = Some(client);
        Ok(())
    }

    async fn spawn_subprocess(&mut self) -> Result<RpcClient, BridgeError> {
        let resolver = PathResolver::new(self.provider);
        let binary = resolver.tool_binary(DEVFLOW_DAEMON_BINARY);

        let mut child = spawn_daemon_process(&binary).await?;

        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Pipe {
            message: "Child process has no stdin".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Pipe {
            message: "Child process has no stdout".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Drain stderr for diagnostics; frames only travel on stdout.
        if let Some(stderr) = child.stderr.take() {
            TokioSpawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!("Control plane stderr: {line}");
                }
            });
        }

        info!("Spawned control plane (PID: {:?})", child.id());
        self.child = Some(child);

        Ok(RpcClient::over_streams(stdout, stdin))
    }
}

/// `binary` is either a bare name resolved via PATH or a full path; PATH
/// lookup never consults the working directory, so the local-binary
/// fallback must pass the joined path.
pub(crate) fn build_spawn_command(binary: impl AsRef<OsStr>) -> TokioCommand {
    let mut cmd = TokioCommand::new(binary);
    cmd.arg(STDIO_FLAG)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

async fn spawn_daemon_process(binary: &str) -> Result<TokioChild, BridgeError> {
    debug!("Attempting to spawn {binary} from PATH");

    match build_spawn_command(binary).spawn() {
        Ok(child) => Ok(child),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("{binary} not in PATH, trying local binary");
            spawn_local_binary(binary)
        }
        Err(err) => Err(BridgeError::Spawn {
            message: format!("Failed to spawn {binary}: {err}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(err),
        }),
    }
}

fn spawn_local_binary(binary: &str) -> Result<TokioChild, BridgeError> {
    let exe = current_exe().map_err(|e| BridgeError::Spawn {
        message: format!("Failed to get current executable path: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })?;

    let dir = exe.parent().ok_or_else(|| BridgeError::Spawn {
        message: format!("Executable has no parent directory: {}", exe.display()),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(IoError::new(ErrorKind::NotFound, "no parent dir")),
    })?;

    let local_path = dir.join(binary);
    debug!("Attempting to spawn {}", local_path.display());

    build_spawn_command(&local_path)
        .spawn()
        .map_err(|e| BridgeError::Spawn {
            message: format!("Failed to spawn {}: {e}", local_path.display()),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })
}

/// Connect to the TCP daemon with exponential backoff.
///
/// The daemon may still be starting (service supervisor restart, WSL2
/// boot); retry until it accepts or the budget runs out.
async fn connect_with_retry(endpoint: &DaemonEndpoint) -> Result<RpcClient, BridgeError> {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(CONNECT_MAX_ELAPSED),
        ..Default::default()
    };

    debug!(
        "Connecting to daemon at {}:{}",
        endpoint.host, endpoint.port
    );

    loop {
        match RpcClient::connect_tcp(&endpoint.host, endpoint.port).await {
            Ok(client) => return Ok(client),
            Err(e) => match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Daemon not reachable ({e}), retrying after {duration:?}");
                    TokioSleep(duration).await;
                }
                None => {
                    warn!(
                        "Daemon at {}:{} unreachable after {CONNECT_MAX_ELAPSED:?}",
                        endpoint.host, endpoint.port
                    );
                    return Err(BridgeError::Unreachable {
                        message: format!(
                            "Daemon at {}:{} did not accept within {CONNECT_MAX_ELAPSED:?}",
                            endpoint.host, endpoint.port
                        ),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
        }
    }
}
