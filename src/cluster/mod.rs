//! The mini cluster orchestrator.
//!
//! [`MiniCluster`] prepares a working directory at construction, then brings
//! up the roles in dependency order on [`start`](MiniCluster::start):
//!
//! 1. coordination service
//! 2. initializer (awaited; must exit 0)
//! 3. workers
//! 4. coordinator
//!
//! [`stop`](MiniCluster::stop) signals the long-running roles and flushes
//! their logs. A cluster dropped or left running at process exit is torn down
//! the same way.
//!
//! # Example
//!
//! ```no_run
//! use minicluster::MiniCluster;
//!
//! # async fn example() -> minicluster::Result<()> {
//! let mut cluster = MiniCluster::with_root("/tmp/cluster", "test1", "secret")?;
//! cluster.start().await?;
//! println!("logs in {}", cluster.log_dir().display());
//! cluster.stop();
//! # Ok(())
//! # }
//! ```

mod cleanup;
mod state;

pub use state::ClusterState;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::{ClusterConfig, StartupWait};
use crate::error::{Error, Result};
use crate::layout::ClusterLayout;
use crate::materialize::{self, RuntimeEnv};
use crate::process::{self, FlushScheduler, Launcher, ManagedProcess, ProcessRecord, Role};
use cleanup::CleanupEntry;

/// A local cluster of role processes rooted in one working directory.
#[derive(Debug)]
pub struct MiniCluster {
    id: Uuid,
    config: ClusterConfig,
    layout: ClusterLayout,
    site_config: PathBuf,
    coordination_config: PathBuf,
    launcher: Launcher,
    state: ClusterState,
    start_attempted: bool,
    entry: Arc<CleanupEntry>,
    scheduler: Option<FlushScheduler>,
    records: Vec<ProcessRecord>,
}

impl MiniCluster {
    /// Cluster with default settings rooted at `dir`.
    pub fn with_root(
        dir: impl Into<PathBuf>,
        instance_name: impl Into<String>,
        root_password: impl Into<String>,
    ) -> Result<Self> {
        Self::new(ClusterConfig::new(dir, instance_name, root_password))
    }

    /// Validate `config`, lay out the working directory and write the
    /// configuration files. Nothing is spawned.
    ///
    /// Fails without touching the filesystem if the directory is a file or a
    /// non-empty directory, or if the configuration is unusable.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let layout = ClusterLayout::new(&config.dir)?;
        layout.validate_root()?;
        if let Some(source) = &config.lib_source {
            if !source.exists() {
                return Err(Error::config(format!(
                    "library source {} does not exist",
                    source.display()
                )));
            }
        }

        layout.create()?;
        if let Some(source) = &config.lib_source {
            layout.seed_library(source)?;
        }

        let runtime = RuntimeEnv::from_env();
        let materialized = materialize::materialize(&config, &layout, &runtime)?;
        let launcher = Launcher::new(&config, &layout, &runtime);

        tracing::info!(
            instance = %config.instance_name,
            root = %layout.root.display(),
            workers = config.workers,
            coordination_port = config.coordination_port,
            "Created mini cluster"
        );

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            layout,
            site_config: materialized.site_config,
            coordination_config: materialized.coordination_config,
            launcher,
            state: ClusterState::Created,
            start_attempted: false,
            entry: Arc::default(),
            scheduler: None,
            records: Vec::new(),
        })
    }

    /// Bring up every role in order.
    ///
    /// Valid once, from [`ClusterState::Created`]. If the initializer fails
    /// the coordination service is left running and the cluster stays
    /// `Created`; call [`stop`](Self::stop) to clean up.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ClusterState::Created || self.start_attempted {
            return Err(Error::IllegalState(format!(
                "start() called on a cluster that is {}{}",
                self.state,
                if self.start_attempted && self.state == ClusterState::Created {
                    " after a failed start"
                } else {
                    ""
                }
            )));
        }
        self.start_attempted = true;

        cleanup::install(self.id, Arc::clone(&self.entry));
        self.scheduler = Some(FlushScheduler::start(self.config.flush_interval()));

        let coordination_args = [self.coordination_config.clone().into_os_string()];
        self.launch_tracked(Role::CoordinationService, &coordination_args)?;

        wait_for_coordination(&self.config).await;

        let mut initializer = self.launch(
            Role::Initializer,
            &[
                "--instance-name".into(),
                OsString::from(&self.config.instance_name),
                "--password".into(),
                OsString::from(&self.config.root_password),
            ],
        )?;
        self.records.push(initializer.record());

        let status = initializer
            .wait()
            .await
            .map_err(|e| Error::io("waiting for initializer", e))?;
        if !status.success() {
            tracing::warn!(pid = initializer.pid(), status = %status, "Initializer failed");
            return Err(Error::Initialization {
                code: status.code(),
            });
        }

        for _ in 0..self.config.workers {
            self.launch_tracked(Role::Worker, &[])?;
        }
        self.launch_tracked(Role::Coordinator, &[])?;

        self.state = ClusterState::Started;
        tracing::info!(
            instance = %self.config.instance_name,
            processes = self.records.len(),
            "Started mini cluster"
        );
        Ok(())
    }

    fn launch(&self, role: Role, args: &[OsString]) -> Result<ManagedProcess> {
        let Some(scheduler) = self.scheduler.as_ref() else {
            return Err(Error::IllegalState(format!(
                "cannot launch {role}: log flushing is not running"
            )));
        };
        self.launcher.launch(role, args, self.entry.logs(), scheduler)
    }

    /// Launch a long-running role and hand it to the cleanup entry.
    ///
    /// A failure leaves earlier launches tracked, so `stop()` still reaches
    /// them.
    fn launch_tracked(&mut self, role: Role, args: &[OsString]) -> Result<()> {
        let process = self.launch(role, args)?;
        self.records.push(process.record());
        self.entry.track(process);
        Ok(())
    }

    /// Terminate the coordination service, the coordinator and the workers,
    /// in that order, then flush all logs.
    ///
    /// Safe before `start()` and after a partial start. Calling it again is a
    /// no-op. Output still in flight may land after this returns.
    pub fn stop(&mut self) {
        if self.state == ClusterState::Stopped {
            return;
        }

        if let Some(entry) = cleanup::uninstall(self.id) {
            entry.run();
        }
        self.scheduler = None;
        self.state = ClusterState::Stopped;

        tracing::info!(instance = %self.config.instance_name, "Stopped mini cluster");
    }

    pub fn instance_name(&self) -> &str {
        &self.config.instance_name
    }

    /// Directory holding every `<role>_<pid>.out` and `.err` file.
    pub fn log_dir(&self) -> &Path {
        &self.layout.logs
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub const fn state(&self) -> ClusterState {
        self.state
    }

    /// Every launched process in launch order, the initializer included.
    pub fn processes(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn site_config_path(&self) -> &Path {
        &self.site_config
    }

    pub fn coordination_config_path(&self) -> &Path {
        &self.coordination_config
    }
}

/// Grace period between launching the coordination service and the
/// initializer.
async fn wait_for_coordination(config: &ClusterConfig) {
    match config.startup_wait {
        StartupWait::Fixed { delay_ms } => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        },
        StartupWait::Probe {
            timeout_ms,
            interval_ms,
        } => {
            let ready = process::wait_for_port(
                config.coordination_port,
                Duration::from_millis(timeout_ms),
                Duration::from_millis(interval_ms),
            )
            .await;
            if !ready {
                tracing::warn!(
                    port = config.coordination_port,
                    timeout_ms = timeout_ms,
                    "Coordination service not accepting connections, continuing"
                );
            }
        },
    }
}

impl Drop for MiniCluster {
    fn drop(&mut self) {
        self.stop();
    }
}
