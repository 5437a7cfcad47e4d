//! Common test utilities for integration tests.
//!
//! [`RoleFixture`] writes a class-path directory of `/bin/sh` scripts standing
//! in for the four role executables, and builds a [`ClusterConfig`] that
//! launches them through the real `minicluster` binary.
//!
//! The long-running roles `exec sleep`, so a termination signal reaches the
//! process the cluster tracks.

#![allow(dead_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use minicluster::{ClusterConfig, StartupWait};
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tempfile::TempDir;

/// How long fixture roles stay alive unless signalled.
pub const ROLE_LIFETIME_SECS: u32 = 60;

/// Upper bound for polling helpers.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RoleFixture {
    temp: TempDir,
    roles: PathBuf,
}

impl RoleFixture {
    /// Fixture whose initializer succeeds.
    pub fn new() -> Self {
        Self::with_initializer_exit(0)
    }

    /// Fixture whose initializer exits with `code`.
    pub fn with_initializer_exit(code: i32) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let roles = temp.path().join("roles");
        fs::create_dir(&roles).expect("Failed to create roles dir");

        let daemon = |banner: &str| {
            format!(
                "#!/bin/sh\n\
                 echo \"{banner} $*\"\n\
                 echo \"home=$MINICLUSTER_HOME\"\n\
                 echo \"logs=$MINICLUSTER_LOG_DIR\"\n\
                 echo \"{banner} ready\" >&2\n\
                 exec sleep {ROLE_LIFETIME_SECS}\n"
            )
        };

        write_script(&roles, "coordination-service", &daemon("coordination-service"));
        write_script(&roles, "coordinator", &daemon("coordinator"));
        write_script(
            &roles,
            "worker",
            &format!(
                "#!/bin/sh\n\
                 for i in 1 2 3 4 5; do echo \"line $i\"; done\n\
                 exec sleep {ROLE_LIFETIME_SECS}\n"
            ),
        );
        write_script(
            &roles,
            "initializer",
            &format!(
                "#!/bin/sh\n\
                 echo \"initializer $*\"\n\
                 echo \"initializer warning\" >&2\n\
                 exit {code}\n"
            ),
        );

        Self { temp, roles }
    }

    /// Directory holding the role scripts.
    pub fn roles(&self) -> &Path {
        &self.roles
    }

    /// Cluster root inside the fixture's temp dir. Not created.
    pub fn root(&self) -> PathBuf {
        self.temp.path().join("cluster")
    }

    /// Config launching the fixture roles with short waits.
    pub fn config(&self) -> ClusterConfig {
        fixture_config(&self.roles, &self.root())
    }
}

/// Config launching the role scripts in `roles` from a cluster at `root`.
pub fn fixture_config(roles: &Path, root: &Path) -> ClusterConfig {
    ClusterConfig::new(root, "test1", "secret")
        .with_launcher(env!("CARGO_BIN_EXE_minicluster"))
        .with_class_path([roles.to_path_buf()])
        .with_lib_source(None)
        .with_startup_wait(StartupWait::fixed(Duration::from_millis(50)))
        .with_flush_interval(Duration::from_millis(50))
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, body).expect("Failed to write role script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make role script executable");
    }
}

/// Poll `condition` until it holds or [`POLL_TIMEOUT`] passes.
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Contents of `path`, or empty if it cannot be read yet.
pub fn read_log(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

/// Blocking variant of [`wait_until`] for tests without a runtime.
pub fn wait_until_blocking<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + POLL_TIMEOUT;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// Pids of live processes launched for the cluster at `root`.
///
/// Found by the home directory in their environment, so this also sees
/// processes the cluster lost track of.
pub fn processes_rooted_at(root: &Path) -> Vec<u32> {
    let mut marker = OsString::from("MINICLUSTER_HOME=");
    marker.push(root);

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_environ(UpdateKind::Always),
    );

    system
        .processes()
        .iter()
        .filter(|(_, process)| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .filter(|(_, process)| process.environ().iter().any(|var| *var == marker))
        .map(|(pid, _)| pid.as_u32())
        .collect()
}
