//! Type definitions for process management.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

/// The part a spawned process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    CoordinationService,
    Initializer,
    Worker,
    Coordinator,
}

impl Role {
    /// Executable name looked up on the class path, also the log file prefix.
    pub const fn entry_name(self) -> &'static str {
        match self {
            Self::CoordinationService => "coordination-service",
            Self::Initializer => "initializer",
            Self::Worker => "worker",
            Self::Coordinator => "coordinator",
        }
    }

    /// Position in the shutdown sequence. The initializer is never signalled.
    pub(crate) const fn stop_order(self) -> Option<u8> {
        match self {
            Self::CoordinationService => Some(0),
            Self::Coordinator => Some(1),
            Self::Worker => Some(2),
            Self::Initializer => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.entry_name())
    }
}

/// Everything needed to spawn one role process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: BTreeMap<String, OsString>,
    pub current_dir: PathBuf,
}

impl LaunchSpec {
    /// Command with piped output streams and a null stdin.
    ///
    /// The parent environment is inherited; `env` is layered on top.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .current_dir(&self.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Launch record kept for diagnostics, in launch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub role: Role,
    pub pid: u32,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}
