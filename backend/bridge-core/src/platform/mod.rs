//! Platform detection.
//!
//! Identifies the OS/runtime context the process is running in. The four
//! recognized contexts are native Linux, macOS, Windows, and WSL2 (a Linux
//! kernel hosted on Windows). WSL2 matters because the devflow control
//! plane cannot run natively on Windows - the UI process must bridge into
//! the WSL2 environment over TCP instead of spawning a local subprocess.
//!
//! # Contract
//!
//! Detection is a pure function of OS state at call time. Consumers are
//! expected to detect once at startup and carry the result around in a
//! [`PlatformProvider`]; there is deliberately no process-global mutable
//! platform value, so tests can substitute a platform without touching
//! shared state.
//!
//! An unrecognized OS is a fatal condition: [`detect`] returns an error and
//! the daemon refuses to start, rather than guessing at behavior.

use crate::error::platform::PlatformError;

use common::ErrorLocation;

use std::panic::Location;

use log::debug;

/// Path of the kernel version string on Linux-family systems.
const PROC_VERSION_PATH: &str = "/proc/version";

/// Substrings that mark a Linux kernel as WSL2 (matched case-insensitively).
const WSL_MARKERS: [&str; 2] = ["microsoft", "wsl"];

/// The runtime platform, detected once per process.
///
/// `Wsl2` is distinct from `Linux`: `is_linux()` is false inside WSL2 even
/// though the kernel is Linux, because resource locations and bridging
/// behavior differ there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Wsl2,
}

impl Platform {
    /// True for WSL2 only.
    pub fn is_wsl(&self) -> bool {
        matches!(self, Platform::Wsl2)
    }

    /// Alias for [`Platform::is_wsl`].
    pub fn is_wsl2(&self) -> bool {
        self.is_wsl()
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    pub fn is_macos(&self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// True only for native Linux; false inside WSL2.
    pub fn is_linux(&self) -> bool {
        matches!(self, Platform::Linux)
    }

    /// True for Linux, macOS, and WSL2; false for Windows.
    pub fn is_unix_like(&self) -> bool {
        !self.is_windows()
    }
}

/// Classify a platform from an OS family name and a kernel version string.
///
/// This is the pure core of detection: [`detect`] feeds it live OS state,
/// tests feed it fixtures. `os_family` follows [`std::env::consts::OS`]
/// naming (`"linux"`, `"macos"`, `"windows"`).
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] for any OS family outside the
/// three recognized ones. There is no "unknown" platform value - a consumer
/// must be unable to proceed at all rather than proceed with guessed
/// behavior.
#[track_caller]
pub fn classify(os_family: &str, kernel_version: &str) -> Result<Platform, PlatformError> {
    match os_family {
        "linux" => {
            let version = kernel_version.to_lowercase();
            if WSL_MARKERS.iter().any(|marker| version.contains(marker)) {
                Ok(Platform::Wsl2)
            } else {
                Ok(Platform::Linux)
            }
        }
        "macos" => Ok(Platform::MacOs),
        "windows" => Ok(Platform::Windows),
        other => Err(PlatformError::Unsupported {
            message: format!("Unrecognized OS family: {other}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// Detect the platform of the running process.
///
/// On Linux-family systems the kernel version string from `/proc/version`
/// is inspected for WSL markers. A missing or unreadable `/proc/version` is
/// treated as native Linux - WSL2 kernels always expose it.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] on an unrecognized OS. Callers
/// hosting the daemon must treat this as fatal at startup.
#[track_caller]
pub fn detect() -> Result<Platform, PlatformError> {
    let kernel_version = if std::env::consts::OS == "linux" {
        std::fs::read_to_string(PROC_VERSION_PATH).unwrap_or_default()
    } else {
        String::new()
    };

    let platform = classify(std::env::consts::OS, &kernel_version)?;
    debug!("Detected platform: {platform:?}");
    Ok(platform)
}

/// Injectable source of the current [`Platform`].
///
/// The provider is constructed once (from [`detect`] or from a fixed value
/// in tests) and passed by value into the path resolver and the bridge mode
/// selector. Substituting a platform in tests is a constructor argument,
/// not a global patch.
#[derive(Debug, Clone, Copy)]
pub struct PlatformProvider {
    platform: Platform,
}

impl PlatformProvider {
    /// Build a provider from live OS detection.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] on an unrecognized OS.
    #[track_caller]
    pub fn detect() -> Result<Self, PlatformError> {
        Ok(Self {
            platform: detect()?,
        })
    }

    /// Build a provider around a known platform value.
    pub fn fixed(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}
