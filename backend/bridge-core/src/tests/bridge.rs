// Unit tests for bridge mode selection and the lifecycle state machine.
// Transport-level behavior (spawn, TCP, ping verification) is covered by
// the integration suite against a live server.

use crate::bridge::{Bridge, BridgeMode, BridgeState, select_mode};
use crate::platform::{Platform, PlatformProvider};

use tempfile::TempDir;

/// **VALUE**: Verifies the default mode table for every platform.
///
/// **WHY THIS MATTERS**: This single function decides whether a UI spawns
/// a child or dials TCP; WSL2 in particular must spawn locally even though
/// it coexists with a Windows host that dials in.
///
/// **BUG THIS CATCHES**: Would catch WSL2 being lumped in with Windows, or
/// the Windows arm flipping to subprocess where no native daemon exists.
#[test]
fn given_each_platform_when_mode_selected_then_matches_table() {
    assert_eq!(select_mode(Platform::Linux), BridgeMode::Subprocess);
    assert_eq!(select_mode(Platform::MacOs), BridgeMode::Subprocess);
    assert_eq!(select_mode(Platform::Wsl2), BridgeMode::Subprocess);
    assert_eq!(select_mode(Platform::Windows), BridgeMode::Tcp);
}

/// **VALUE**: Verifies a new bridge starts stopped with nothing attached.
#[test]
fn given_new_bridge_when_inspected_then_stopped_and_empty() {
    let dir = TempDir::new().expect("temp dir");
    let bridge = Bridge::new(PlatformProvider::fixed(Platform::Linux), dir.path());

    assert_eq!(bridge.state(), BridgeState::Stopped);
    assert_eq!(bridge.mode(), None);
    assert!(bridge.client().is_none());
}

/// **VALUE**: Verifies a connect failure lands the bridge in the Error
/// state with no client attached.
///
/// **WHY THIS MATTERS**: The UI surfaces this state to the operator; a
/// failed connect that leaves the bridge in Starting would render a
/// spinner forever.
///
/// **BUG THIS CATCHES**: Would catch the error arm forgetting to clear a
/// partially-established client.
#[tokio::test]
async fn given_corrupt_config_when_connected_then_bridge_enters_error_state() {
    // GIVEN: A config directory with an unparsable config file
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("config.json"), "{broken").expect("write");

    let mut bridge = Bridge::new(PlatformProvider::fixed(Platform::Linux), dir.path());

    // WHEN: Connecting
    let result = bridge.connect().await;

    // THEN: Failure, Error state, no client
    assert!(result.is_err());
    assert_eq!(bridge.state(), BridgeState::Error);
    assert!(bridge.client().is_none());
}

/// **VALUE**: Verifies disconnect on a stopped bridge is a harmless no-op.
#[tokio::test]
async fn given_stopped_bridge_when_disconnected_then_remains_stopped() {
    let dir = TempDir::new().expect("temp dir");
    let mut bridge = Bridge::new(PlatformProvider::fixed(Platform::Linux), dir.path());

    bridge.disconnect().await;

    assert_eq!(bridge.state(), BridgeState::Stopped);
}

/// **VALUE**: Verifies the local-binary fallback spawns by full path, not
/// by bare name with a changed working directory.
///
/// **WHY THIS MATTERS**: PATH lookup on unix never consults the working
/// directory, so a control plane sitting next to the current executable is
/// only reachable when the joined path itself is spawned. The fallback is
/// what makes a packaged install work without PATH setup.
///
/// **BUG THIS CATCHES**: Would catch the spawn command being handed the
/// bare name plus `current_dir`, which repeats the original not-found
/// error while claiming the local path was tried.
#[cfg(unix)]
#[tokio::test]
async fn given_binary_outside_path_when_spawned_by_full_path_then_starts() {
    use std::os::unix::fs::PermissionsExt;

    // GIVEN: An executable in a directory that is not on PATH
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("fake-daemon");
    std::fs::write(&local_path, "#!/bin/sh\nexit 0\n").expect("write script");
    std::fs::set_permissions(&local_path, std::fs::Permissions::from_mode(0o755))
        .expect("mark executable");

    // WHEN: Spawning the bare name with only the working directory changed
    let bare = crate::bridge::build_spawn_command("fake-daemon")
        .current_dir(dir.path())
        .spawn();

    // THEN: PATH lookup does not find it
    assert!(bare.is_err(), "Bare name must not resolve via cwd");

    // WHEN: Spawning the joined path
    let mut child = crate::bridge::build_spawn_command(&local_path)
        .spawn()
        .expect("full path should spawn");

    // THEN: The process starts and exits cleanly
    let status = child.wait().await.expect("wait for child");
    assert!(status.success());
}

/// **VALUE**: Verifies BridgeMode serializes to the names the config file
/// uses.
///
/// **WHY THIS MATTERS**: `mode_override` is hand-edited by operators; the
/// on-disk names are part of the config contract.
#[test]
fn given_bridge_modes_when_serialized_then_names_are_stable() {
    assert_eq!(
        serde_json::to_string(&BridgeMode::Subprocess).unwrap(),
        r#""Subprocess""#
    );
    assert_eq!(serde_json::to_string(&BridgeMode::Tcp).unwrap(), r#""Tcp""#);

    let parsed: BridgeMode = serde_json::from_str(r#""Tcp""#).unwrap();
    assert_eq!(parsed, BridgeMode::Tcp);
}
