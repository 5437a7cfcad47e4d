//! Configuration materialization.
//!
//! Writes the two artifacts the spawned processes read at startup:
//!
//! - [`site`]: `conf/cluster-site.xml` for the coordinator and workers
//! - [`coordination`]: `conf/coordination.cfg` for the coordination service
//!
//! Both are written once, at cluster construction.

pub mod coordination;
pub mod ports;
pub mod site;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ClusterConfig;
use crate::constants;
use crate::error::{Error, Result};
use crate::layout::ClusterLayout;

pub use site::SitePorts;

/// Snapshot of the runtime locations named by the orchestrator's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    pub home: Option<PathBuf>,
    pub storage_home: Option<PathBuf>,
    pub storage_prefix: Option<PathBuf>,
    pub coordination_home: Option<PathBuf>,
}

impl RuntimeEnv {
    /// Read the locations from the current process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var_os(name).map(PathBuf::from);
        Self {
            home: var(constants::ENV_HOME),
            storage_home: var(constants::ENV_STORAGE_HOME),
            storage_prefix: var(constants::ENV_STORAGE_PREFIX),
            coordination_home: var(constants::ENV_COORDINATION_HOME),
        }
    }

    /// Variables to pass through to spawned processes, in a fixed order.
    pub fn forwarded(&self) -> Vec<(&'static str, &Path)> {
        [
            (constants::ENV_STORAGE_PREFIX, &self.storage_prefix),
            (constants::ENV_STORAGE_HOME, &self.storage_home),
            (constants::ENV_COORDINATION_HOME, &self.coordination_home),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|path| (name, path)))
        .collect()
    }
}

/// Paths and contents of the written artifacts.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub site_config: PathBuf,
    pub coordination_config: PathBuf,
    pub site_entries: Vec<(String, String)>,
}

/// Allocate ports and write both config files into `conf/`.
pub fn materialize(
    config: &ClusterConfig,
    layout: &ClusterLayout,
    runtime: &RuntimeEnv,
) -> Result<Materialized> {
    let ports = SitePorts {
        coordinator: allocate_port()?,
        worker: allocate_port()?,
        trace: allocate_port()?,
    };

    let site_entries = site::site_entries(config, layout, runtime, ports);
    let site_config = layout.conf.join(constants::SITE_CONFIG_FILE);
    write(&site_config, &site::render_site_xml(&site_entries))?;

    let header = chrono::Local::now()
        .format("%a %b %d %H:%M:%S %Z %Y")
        .to_string();
    let coordination_config = layout.conf.join(constants::COORDINATION_CONFIG_FILE);
    write(
        &coordination_config,
        &coordination::render_properties(
            &coordination::coordination_entries(config, layout),
            &header,
        ),
    )?;

    tracing::debug!(
        site = %site_config.display(),
        coordination = %coordination_config.display(),
        coordinator_port = ports.coordinator,
        worker_port = ports.worker,
        "Materialized cluster configuration"
    );

    Ok(Materialized {
        site_config,
        coordination_config,
        site_entries,
    })
}

fn allocate_port() -> Result<u16> {
    ports::free_port().map_err(|e| Error::io("allocating ephemeral port", e))
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::io(format!("writing {}", path.display()), e))
}
