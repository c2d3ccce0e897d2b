//! Path resolution for platform-specific resources.
//!
//! Translates an abstract [`ResourceKind`] into the concrete path or
//! connection string where that resource lives on the current platform.
//! Resolution only computes the expected location - it never creates the
//! resource. Results are computed per call and never cached, since they can
//! depend on environment variables that change between calls.
//!
//! The resolver also owns the one table of per-OS tool binary names
//! ([`PathResolver::tool_binary`]), so `op` vs `op.exe` style branching is
//! not duplicated across external-tool wrappers.

use crate::error::paths::PathError;
use crate::platform::{Platform, PlatformProvider};

use common::ErrorLocation;

use std::env::var as env_var;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

const DOCKER_SOCKET_UNIX: &str = "/var/run/docker.sock";
const DOCKER_SOCKET_WINDOWS: &str = "//./pipe/docker_engine";
const DOCKER_SOCKET_MACOS_DESKTOP: &str = "~/.docker/run/docker.sock";
const HOSTS_FILE_UNIX: &str = "/etc/hosts";
const HOSTS_FILE_WINDOWS: &str = "C:/Windows/System32/drivers/etc/hosts";
const ENV_VAR_PATTERN: &str = r"\$([A-Za-z_][A-Za-z0-9_]*)";

static ENV_VAR_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_env_var_regex() -> &'static Regex {
    ENV_VAR_REGEX.get_or_init(|| Regex::new(ENV_VAR_PATTERN).expect("valid regex pattern"))
}

/// A resource class the system must locate.
///
/// Each kind resolves, given a platform, to a path or connection string via
/// [`PathResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// The Docker engine socket (or named pipe on Windows).
    DockerSocket,

    /// The system hosts file.
    HostsFile,

    /// The devflow state directory.
    DevflowHome,

    /// The user's SSH directory.
    SshDir,

    /// The mkcert certificate store.
    CertDir,

    /// A `host_socket:container_target` Docker volume mount string.
    SocketMount { target: String },
}

/// Resolves [`ResourceKind`] values to concrete locations.
///
/// Holds a [`PlatformProvider`] injected at construction; substituting a
/// platform in tests is a constructor parameter, not global mutation.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver {
    provider: PlatformProvider,
}

impl PathResolver {
    pub fn new(provider: PlatformProvider) -> Self {
        Self { provider }
    }

    pub fn platform(&self) -> Platform {
        self.provider.platform()
    }

    /// Resolve a resource kind to its platform-specific location.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if `~` expansion finds no home directory, or a
    /// required environment variable (`APPDATA`, `LOCALAPPDATA`,
    /// `USERPROFILE`) is not set.
    pub fn resolve(&self, kind: &ResourceKind) -> Result<String, PathError> {
        let resolved = match kind {
            ResourceKind::DockerSocket => self.docker_socket()?,
            ResourceKind::HostsFile => self.hosts_file().to_string(),
            ResourceKind::DevflowHome => path_to_string(self.devflow_home()?),
            ResourceKind::SshDir => path_to_string(self.ssh_dir()?),
            ResourceKind::CertDir => path_to_string(self.cert_dir()?),
            ResourceKind::SocketMount { target } => self.socket_mount(target)?,
        };

        trace!("Resolved {kind:?} -> {resolved}");
        Ok(resolved)
    }

    /// Location of the Docker engine socket.
    ///
    /// On macOS, Docker Desktop places a user-local socket at
    /// `~/.docker/run/docker.sock`; that path wins when it exists, with the
    /// system socket as fallback.
    pub fn docker_socket(&self) -> Result<String, PathError> {
        match self.platform() {
            Platform::Windows => Ok(DOCKER_SOCKET_WINDOWS.to_string()),
            Platform::MacOs => {
                let desktop_socket = expand_path(DOCKER_SOCKET_MACOS_DESKTOP)?;
                if desktop_socket.exists() {
                    Ok(path_to_string(desktop_socket))
                } else {
                    Ok(DOCKER_SOCKET_UNIX.to_string())
                }
            }
            Platform::Linux | Platform::Wsl2 => Ok(DOCKER_SOCKET_UNIX.to_string()),
        }
    }

    pub fn hosts_file(&self) -> &'static str {
        if self.platform().is_windows() {
            HOSTS_FILE_WINDOWS
        } else {
            HOSTS_FILE_UNIX
        }
    }

    /// The devflow state directory (config, persisted bridge endpoint).
    ///
    /// Windows prefers `%APPDATA%/devflow` and falls back to
    /// `%USERPROFILE%/.devflow` when `APPDATA` is unset.
    #[track_caller]
    pub fn devflow_home(&self) -> Result<PathBuf, PathError> {
        if self.platform().is_windows() {
            if let Ok(appdata) = env_var("APPDATA") {
                return Ok(PathBuf::from(appdata).join("devflow"));
            }
            let profile = require_env("USERPROFILE")?;
            return Ok(PathBuf::from(profile).join(".devflow"));
        }

        expand_path("~/.devflow")
    }

    #[track_caller]
    pub fn ssh_dir(&self) -> Result<PathBuf, PathError> {
        if self.platform().is_windows() {
            let profile = require_env("USERPROFILE")?;
            return Ok(PathBuf::from(profile).join(".ssh"));
        }

        expand_path("~/.ssh")
    }

    /// The mkcert certificate store for the current platform.
    #[track_caller]
    pub fn cert_dir(&self) -> Result<PathBuf, PathError> {
        match self.platform() {
            Platform::Windows => {
                let local_appdata = require_env("LOCALAPPDATA")?;
                Ok(PathBuf::from(local_appdata).join("mkcert"))
            }
            Platform::MacOs => expand_path("~/Library/Application Support/mkcert"),
            Platform::Linux | Platform::Wsl2 => expand_path("~/.local/share/mkcert"),
        }
    }

    /// Docker volume mount string binding the host engine socket to
    /// `target` inside a container.
    pub fn socket_mount(&self, target: &str) -> Result<String, PathError> {
        let host_socket = self.docker_socket()?;
        Ok(format!("{host_socket}:{target}"))
    }

    /// Per-OS binary name for an external tool (`op` vs `op.exe`).
    pub fn tool_binary(&self, tool: &str) -> String {
        if self.platform().is_windows() {
            format!("{tool}.exe")
        } else {
            tool.to_string()
        }
    }
}

/// Expand `~` and `$VAR` tokens in a path string.
///
/// A leading `~` is replaced with the user's home directory. Each `$VAR`
/// token is replaced with the live value of that environment variable.
///
/// # Errors
///
/// - [`PathError::NoHomeDir`] if `~` is present but no home directory can
///   be resolved.
/// - [`PathError::MissingEnvVar`] if a referenced variable is unset.
#[track_caller]
pub fn expand_path(input: &str) -> Result<PathBuf, PathError> {
    let after_tilde = if input == "~" || input.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| PathError::NoHomeDir {
            message: format!("Cannot expand '{input}': no home directory resolved"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if input == "~" {
            return Ok(home);
        }

        path_to_string(home.join(&input[2..]))
    } else {
        input.to_string()
    };

    let mut expanded = String::with_capacity(after_tilde.len());
    let mut last_end = 0;

    for capture in get_env_var_regex().captures_iter(&after_tilde) {
        let whole = capture.get(0).expect("capture 0 always present");
        let name = capture.get(1).expect("group 1 always present").as_str();

        let value = env_var(name).map_err(|_| PathError::MissingEnvVar {
            message: format!("Cannot expand '{input}': ${name} is not set"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        expanded.push_str(&after_tilde[last_end..whole.start()]);
        expanded.push_str(&value);
        last_end = whole.end();
    }
    expanded.push_str(&after_tilde[last_end..]);

    Ok(PathBuf::from(expanded))
}

fn path_to_string(path: PathBuf) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[track_caller]
fn require_env(name: &str) -> Result<String, PathError> {
    env_var(name).map_err(|_| PathError::MissingEnvVar {
        message: format!("{name} is not set"),
        location: ErrorLocation::from(Location::caller()),
    })
}
