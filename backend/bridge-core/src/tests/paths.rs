// Unit tests for path expansion and the resource resolution table.
// Tests that mutate process environment variables are #[serial].

use crate::paths::{PathResolver, ResourceKind, expand_path};
use crate::platform::{Platform, PlatformProvider};

use serial_test::serial;

fn resolver_for(platform: Platform) -> PathResolver {
    PathResolver::new(PlatformProvider::fixed(platform))
}

/// **VALUE**: Verifies that `~` expands to the real home directory.
///
/// **WHY THIS MATTERS**: Every unix-side table entry goes through tilde
/// expansion; if it breaks, ssh dirs, cert dirs, and devflow home all
/// resolve to garbage relative paths.
///
/// **BUG THIS CATCHES**: Would catch the expansion dropping or doubling
/// the path separator, or expanding `~` anywhere but the leading position.
#[test]
fn given_tilde_path_when_expanded_then_equals_home_joined() {
    // GIVEN: The resolved home directory
    let home = dirs::home_dir().expect("test environment has a home directory");

    // WHEN: Expanding a tilde path
    let expanded = expand_path("~/.ssh").expect("expansion should succeed");

    // THEN: Equals home + suffix
    assert_eq!(expanded, home.join(".ssh"));

    // AND: A bare tilde is home itself
    assert_eq!(expand_path("~").unwrap(), home);

    // AND: A mid-path tilde is left alone
    assert_eq!(
        expand_path("/opt/~backup").unwrap(),
        std::path::PathBuf::from("/opt/~backup")
    );
}

/// **VALUE**: Verifies `$VAR` substitution against live environment values.
///
/// **WHY THIS MATTERS**: Resolution is deliberately uncached because env
/// vars change; substitution must read the value at call time.
///
/// **BUG THIS CATCHES**: Would catch a regex that matches partial names or
/// fails on multiple tokens in one path.
#[test]
#[serial]
fn given_env_var_tokens_when_expanded_then_substitutes_live_values() {
    // GIVEN: Live environment variables
    unsafe {
        std::env::set_var("DEVFLOW_TEST_ROOT", "/srv/devflow");
        std::env::set_var("DEVFLOW_TEST_NAME", "alpha");
    }

    // WHEN: Expanding paths containing the tokens
    let single = expand_path("$DEVFLOW_TEST_ROOT/x").unwrap();
    let double = expand_path("$DEVFLOW_TEST_ROOT/envs/$DEVFLOW_TEST_NAME").unwrap();

    // THEN: Both substitute the live values
    assert_eq!(single, std::path::PathBuf::from("/srv/devflow/x"));
    assert_eq!(double, std::path::PathBuf::from("/srv/devflow/envs/alpha"));

    unsafe {
        std::env::remove_var("DEVFLOW_TEST_ROOT");
        std::env::remove_var("DEVFLOW_TEST_NAME");
    }
}

/// **VALUE**: Verifies that an unset `$VAR` is an error, not an empty string.
///
/// **WHY THIS MATTERS**: Silently substituting "" produces paths like
/// "/devflow" rooted at / - plausible-looking and very wrong.
///
/// **BUG THIS CATCHES**: Would catch `env::var` failures being mapped to
/// a default instead of an error.
#[test]
#[serial]
fn given_unset_env_var_when_expanded_then_returns_error() {
    unsafe {
        std::env::remove_var("DEVFLOW_TEST_UNSET");
    }

    let result = expand_path("$DEVFLOW_TEST_UNSET/x");

    assert!(result.is_err(), "Unset variable should fail expansion");
    let message = format!("{}", result.unwrap_err());
    assert!(
        message.contains("DEVFLOW_TEST_UNSET"),
        "Error should name the missing variable: {message}"
    );
}

/// **VALUE**: Verifies the docker socket table row for every platform.
///
/// **WHY THIS MATTERS**: Provider wrappers hand this string straight to
/// docker; a wrong value breaks every container operation on that OS.
///
/// **BUG THIS CATCHES**: Would catch swapped Windows/unix rows or a macOS
/// resolution that ignores the fallback.
#[test]
fn given_each_platform_when_docker_socket_resolved_then_matches_table() {
    // Windows uses the named pipe
    assert_eq!(
        resolver_for(Platform::Windows).docker_socket().unwrap(),
        "//./pipe/docker_engine"
    );

    // Linux and WSL2 use the system socket
    assert_eq!(
        resolver_for(Platform::Linux).docker_socket().unwrap(),
        "/var/run/docker.sock"
    );
    assert_eq!(
        resolver_for(Platform::Wsl2).docker_socket().unwrap(),
        "/var/run/docker.sock"
    );

    // macOS prefers the Docker Desktop socket when present, else the
    // system socket; either way the result is one of the two known paths.
    let macos_socket = resolver_for(Platform::MacOs).docker_socket().unwrap();
    let desktop = dirs::home_dir()
        .unwrap()
        .join(".docker/run/docker.sock")
        .to_string_lossy()
        .to_string();
    assert!(
        macos_socket == desktop || macos_socket == "/var/run/docker.sock",
        "Unexpected macOS docker socket: {macos_socket}"
    );
}

/// **VALUE**: Verifies the hosts file row for unix-likes and Windows.
///
/// **BUG THIS CATCHES**: Would catch the Windows drive-path row being
/// normalized away or the unix row picking up a prefix.
#[test]
fn given_each_platform_when_hosts_file_resolved_then_matches_table() {
    assert_eq!(resolver_for(Platform::Linux).hosts_file(), "/etc/hosts");
    assert_eq!(resolver_for(Platform::MacOs).hosts_file(), "/etc/hosts");
    assert_eq!(resolver_for(Platform::Wsl2).hosts_file(), "/etc/hosts");
    assert_eq!(
        resolver_for(Platform::Windows).hosts_file(),
        "C:/Windows/System32/drivers/etc/hosts"
    );
}

/// **VALUE**: Verifies devflow home resolution, including the Windows
/// APPDATA-then-USERPROFILE fallback chain.
///
/// **WHY THIS MATTERS**: The config file and logs live here; the fallback
/// order is observable behavior operators depend on.
///
/// **BUG THIS CATCHES**: Would catch the fallback being inverted or the
/// unix row not expanding the tilde.
#[test]
#[serial]
fn given_windows_env_when_devflow_home_resolved_then_follows_fallback_chain() {
    let resolver = resolver_for(Platform::Windows);

    // GIVEN: APPDATA is set
    unsafe {
        std::env::set_var("APPDATA", "C:/Users/dev/AppData/Roaming");
        std::env::set_var("USERPROFILE", "C:/Users/dev");
    }

    // THEN: APPDATA wins
    assert_eq!(
        resolver.devflow_home().unwrap(),
        std::path::PathBuf::from("C:/Users/dev/AppData/Roaming").join("devflow")
    );

    // GIVEN: APPDATA is unset
    unsafe {
        std::env::remove_var("APPDATA");
    }

    // THEN: USERPROFILE/.devflow is the fallback
    assert_eq!(
        resolver.devflow_home().unwrap(),
        std::path::PathBuf::from("C:/Users/dev").join(".devflow")
    );

    unsafe {
        std::env::remove_var("USERPROFILE");
    }
}

/// **VALUE**: Verifies unix devflow home and ssh dir against `~` expansion.
#[test]
fn given_unix_platforms_when_home_dirs_resolved_then_under_home() {
    let home = dirs::home_dir().unwrap();

    for platform in [Platform::Linux, Platform::MacOs, Platform::Wsl2] {
        let resolver = resolver_for(platform);
        assert_eq!(resolver.devflow_home().unwrap(), home.join(".devflow"));
        assert_eq!(resolver.ssh_dir().unwrap(), home.join(".ssh"));
    }
}

/// **VALUE**: Verifies the mkcert cert dir row for every platform.
///
/// **BUG THIS CATCHES**: Would catch the macOS row losing its space
/// ("Application Support") or Linux falling back to the macOS location.
#[test]
#[serial]
fn given_each_platform_when_cert_dir_resolved_then_matches_table() {
    let home = dirs::home_dir().unwrap();

    assert_eq!(
        resolver_for(Platform::Linux).cert_dir().unwrap(),
        home.join(".local/share/mkcert")
    );
    assert_eq!(
        resolver_for(Platform::Wsl2).cert_dir().unwrap(),
        home.join(".local/share/mkcert")
    );
    assert_eq!(
        resolver_for(Platform::MacOs).cert_dir().unwrap(),
        home.join("Library/Application Support/mkcert")
    );

    unsafe {
        std::env::set_var("LOCALAPPDATA", "C:/Users/dev/AppData/Local");
    }
    assert_eq!(
        resolver_for(Platform::Windows).cert_dir().unwrap(),
        std::path::PathBuf::from("C:/Users/dev/AppData/Local").join("mkcert")
    );
    unsafe {
        std::env::remove_var("LOCALAPPDATA");
    }
}

/// **VALUE**: Verifies socket mount strings pair the host socket with the
/// container target.
///
/// **BUG THIS CATCHES**: Would catch the separator or operand order being
/// swapped - docker accepts only `host:container`.
#[test]
fn given_linux_and_windows_when_socket_mount_resolved_then_pairs_host_and_target() {
    assert_eq!(
        resolver_for(Platform::Linux)
            .socket_mount("/var/run/docker.sock")
            .unwrap(),
        "/var/run/docker.sock:/var/run/docker.sock"
    );
    assert_eq!(
        resolver_for(Platform::Windows)
            .socket_mount("/var/run/docker.sock")
            .unwrap(),
        "//./pipe/docker_engine:/var/run/docker.sock"
    );
}

/// **VALUE**: Verifies the one-table tool binary naming (`op` vs `op.exe`).
///
/// **WHY THIS MATTERS**: This table exists so per-tool wrappers never
/// re-implement the OS branch; it must be right for all of them at once.
#[test]
fn given_tool_names_when_binary_resolved_then_windows_gets_exe_suffix() {
    let windows = resolver_for(Platform::Windows);
    let linux = resolver_for(Platform::Linux);

    for tool in ["op", "gh", "mkcert", "docker", "supabase", "devflowd"] {
        assert_eq!(windows.tool_binary(tool), format!("{tool}.exe"));
        assert_eq!(linux.tool_binary(tool), tool);
    }
}

/// **VALUE**: Verifies that `resolve()` covers every ResourceKind.
///
/// **BUG THIS CATCHES**: Would catch a new kind added to the enum but not
/// to the resolve match (non_exhaustive drift guarded by the compiler, but
/// the string-level wiring is only guarded here).
#[test]
fn given_all_resource_kinds_when_resolved_then_each_yields_a_location() {
    let resolver = resolver_for(Platform::Linux);

    let kinds = vec![
        ResourceKind::DockerSocket,
        ResourceKind::HostsFile,
        ResourceKind::DevflowHome,
        ResourceKind::SshDir,
        ResourceKind::CertDir,
        ResourceKind::SocketMount {
            target: "/var/run/docker.sock".to_string(),
        },
    ];

    for kind in kinds {
        let resolved = resolver.resolve(&kind).expect("resolution should succeed");
        assert!(!resolved.is_empty(), "Empty resolution for {kind:?}");
    }
}
