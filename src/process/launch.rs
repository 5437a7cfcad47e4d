//! Launching and terminating role processes.
//!
//! Every role is started through the same launcher executable (by default the
//! current binary) whose `exec` subcommand finds the role's executable on the
//! class path and replaces itself with it. The orchestrator therefore sees the
//! real service pid and can signal it directly.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use super::capture::{spawn_capture, FlushScheduler, LogRegistry, LogWriter};
use super::types::{LaunchSpec, ProcessRecord, Role};
use crate::config::ClusterConfig;
use crate::constants;
use crate::error::{Error, Result};
use crate::layout::ClusterLayout;
use crate::materialize::RuntimeEnv;

/// Builds launch specs for one cluster and spawns them.
#[derive(Debug, Clone)]
pub struct Launcher {
    launcher: Option<PathBuf>,
    conf_dir: PathBuf,
    class_path: Vec<PathBuf>,
    max_heap: String,
    root: PathBuf,
    log_dir: PathBuf,
    forwarded: Vec<(&'static str, PathBuf)>,
}

impl Launcher {
    pub fn new(config: &ClusterConfig, layout: &ClusterLayout, runtime: &RuntimeEnv) -> Self {
        Self {
            launcher: config.launcher.clone(),
            conf_dir: layout.conf.clone(),
            class_path: config.class_path.clone(),
            max_heap: config.max_heap.clone(),
            root: layout.root.clone(),
            log_dir: layout.logs.clone(),
            forwarded: runtime
                .forwarded()
                .into_iter()
                .map(|(name, path)| (name, path.to_path_buf()))
                .collect(),
        }
    }

    /// Locate the launcher executable.
    fn program(&self, role: Role) -> Result<PathBuf> {
        let program = match &self.launcher {
            Some(path) => path.clone(),
            None => env::current_exe().map_err(|e| {
                Error::launch(role, format!("cannot locate current executable: {e}"))
            })?,
        };

        if !program.is_file() {
            return Err(Error::launch(
                role,
                format!("launcher {} not found", program.display()),
            ));
        }
        Ok(program)
    }

    /// Build the launch spec for `role` with role-specific `args`.
    pub fn spec(&self, role: Role, args: &[OsString]) -> Result<LaunchSpec> {
        let class_path = env::join_paths(
            std::iter::once(&self.conf_dir).chain(self.class_path.iter()),
        )
        .map_err(|e| Error::launch(role, format!("invalid class path: {e}")))?;

        let mut argv: Vec<OsString> = vec![
            "exec".into(),
            "--class-path".into(),
            class_path,
            "--max-heap".into(),
            self.max_heap.clone().into(),
            role.entry_name().into(),
            "--".into(),
        ];
        argv.extend(args.iter().cloned());

        let mut vars = BTreeMap::new();
        vars.insert(constants::ENV_HOME.to_string(), self.root.clone().into_os_string());
        vars.insert(
            constants::ENV_LOG_DIR.to_string(),
            self.log_dir.clone().into_os_string(),
        );
        for (name, value) in &self.forwarded {
            vars.insert((*name).to_string(), value.clone().into_os_string());
        }

        Ok(LaunchSpec {
            program: self.program(role)?,
            args: argv,
            env: vars,
            current_dir: self.root.clone(),
        })
    }

    /// Spawn `role` and attach a capture task to each output stream.
    ///
    /// Returns once the OS has created the process. Writers are registered
    /// with both the orchestrator's registry and the flush scheduler.
    pub fn launch(
        &self,
        role: Role,
        args: &[OsString],
        registry: &LogRegistry,
        scheduler: &FlushScheduler,
    ) -> Result<ManagedProcess> {
        let spec = self.spec(role, args)?;

        let mut command = spec.command();
        // the initializer is awaited, never signalled; dropping its handle
        // mid-wait must not leave it running
        command.kill_on_drop(role.stop_order().is_none());

        let mut child = command
            .spawn()
            .map_err(|e| Error::launch(role, format!("spawn failed: {e}")))?;

        let pid = child
            .id()
            .ok_or_else(|| Error::launch(role, "process exited before its pid was read"))?;

        let stdout_log = self.log_dir.join(format!("{}_{pid}.out", role.entry_name()));
        let stderr_log = self.log_dir.join(format!("{}_{pid}.err", role.entry_name()));
        let writers = LogWriter::create(&stdout_log)
            .map_err(|e| Error::io(format!("opening log file {}", stdout_log.display()), e))
            .and_then(|out| {
                LogWriter::create(&stderr_log)
                    .map(|err| (out, err))
                    .map_err(|e| Error::io(format!("opening log file {}", stderr_log.display()), e))
            });
        let (stdout_writer, stderr_writer) = match writers {
            Ok(writers) => writers,
            Err(e) => {
                // nothing will track this child, so it must not outlive the error
                if let Err(kill) = child.start_kill() {
                    tracing::warn!(role = %role, pid = pid, error = %kill, "Failed to kill unlogged process");
                }
                tracing::warn!(role = %role, pid = pid, error = %e, "Killed process whose logs could not be opened");
                return Err(e);
            },
        };

        if let Some(stream) = child.stderr.take() {
            spawn_capture(stream, Arc::clone(&stderr_writer));
        }
        if let Some(stream) = child.stdout.take() {
            spawn_capture(stream, Arc::clone(&stdout_writer));
        }

        for writer in [&stdout_writer, &stderr_writer] {
            registry.register(Arc::clone(writer));
            scheduler.register(writer);
        }

        tracing::info!(
            role = %role,
            pid = pid,
            stdout = %stdout_log.display(),
            stderr = %stderr_log.display(),
            "Launched process"
        );

        Ok(ManagedProcess {
            role,
            pid,
            child,
            stdout: stdout_writer,
            stderr: stderr_writer,
        })
    }
}

/// A spawned role process and the writers capturing its output.
#[derive(Debug)]
pub struct ManagedProcess {
    role: Role,
    pid: u32,
    child: tokio::process::Child,
    stdout: Arc<LogWriter>,
    stderr: Arc<LogWriter>,
}

impl ManagedProcess {
    pub const fn role(&self) -> Role {
        self.role
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub fn record(&self) -> ProcessRecord {
        ProcessRecord {
            role: self.role,
            pid: self.pid,
            stdout_log: self.stdout.path().to_path_buf(),
            stderr_log: self.stderr.path().to_path_buf(),
        }
    }

    /// Wait for the process to exit. Has no timeout.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send the termination signal unless the process was already reaped.
    ///
    /// Failures are logged, never returned.
    pub fn terminate(&mut self) {
        if self.child.id().is_none() {
            tracing::debug!(role = %self.role, pid = self.pid, "Process already exited");
            return;
        }

        #[cfg(unix)]
        {
            if let Err(e) = terminate_pid(self.pid) {
                tracing::warn!(role = %self.role, pid = self.pid, error = %e, "Failed to signal process");
                return;
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = self.child.start_kill() {
                tracing::warn!(role = %self.role, pid = self.pid, error = %e, "Failed to kill process");
                return;
            }
        }

        tracing::info!(role = %self.role, pid = self.pid, "Terminated process");
    }
}

/// Send SIGTERM to `pid`. A process that is already gone is not an error.
#[cfg(unix)]
pub fn terminate_pid(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| io::Error::other(format!("invalid pid {pid}")))?;
    match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn launcher(launcher: Option<PathBuf>) -> Launcher {
        let layout = ClusterLayout::new(Path::new("/tmp/x")).unwrap();
        let mut config = ClusterConfig::new("/tmp/x", "test1", "secret")
            .with_class_path(["/opt/roles", "/usr/share/roles"]);
        config.launcher = launcher;
        let runtime = RuntimeEnv {
            home: Some(PathBuf::from("/opt/cluster")),
            storage_home: Some(PathBuf::from("/opt/storage")),
            storage_prefix: None,
            coordination_home: None,
        };
        Launcher::new(&config, &layout, &runtime)
    }

    #[test]
    fn test_spec_arguments() {
        let spec = launcher(None)
            .spec(Role::Initializer, &["--instance-name".into(), "test1".into()])
            .unwrap();

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "exec",
                "--class-path",
                "/tmp/x/conf:/opt/roles:/usr/share/roles",
                "--max-heap",
                "128m",
                "initializer",
                "--",
                "--instance-name",
                "test1",
            ]
        );
        assert_eq!(spec.current_dir, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_spec_environment() {
        let spec = launcher(None).spec(Role::Worker, &[]).unwrap();

        assert_eq!(spec.env["MINICLUSTER_HOME"], OsString::from("/tmp/x"));
        assert_eq!(spec.env["MINICLUSTER_LOG_DIR"], OsString::from("/tmp/x/logs"));
        assert_eq!(spec.env["STORAGE_HOME"], OsString::from("/opt/storage"));
        assert!(!spec.env.contains_key("STORAGE_PREFIX"));
        assert!(!spec.env.contains_key("COORDINATION_HOME"));
    }

    #[test]
    fn test_spec_defaults_to_current_exe() {
        let spec = launcher(None).spec(Role::Worker, &[]).unwrap();
        assert_eq!(spec.program, env::current_exe().unwrap());
    }

    #[test]
    fn test_missing_launcher_is_launch_error() {
        let err = launcher(Some(PathBuf::from("/nonexistent/launcher")))
            .spec(Role::Coordinator, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Launch {
                role: Role::Coordinator,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_missing_pid_is_ok() {
        assert!(terminate_pid(i32::MAX as u32).is_ok());
    }
}
