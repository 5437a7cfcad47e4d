//! Cluster configuration.
//!
//! [`ClusterConfig`] is built in code with `with_*` methods or loaded from a
//! TOML file. Every optional field has a default suitable for a throwaway
//! test cluster:
//!
//! ```toml
//! dir = "/tmp/cluster"
//! instance_name = "test1"
//! root_password = "secret"
//! workers = 2
//!
//! [site_config]
//! "worker.cache.data.size" = "20M"
//!
//! [startup_wait]
//! mode = "probe"
//! timeout_ms = 5000
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{Error, Result};
use crate::materialize::ports;
use crate::utils::parse_size;

/// How `start()` waits for the coordination service before initializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StartupWait {
    /// Sleep for a fixed grace period.
    Fixed {
        #[serde(default = "default_startup_delay_ms")]
        delay_ms: u64,
    },
    /// Poll the coordination port until it accepts a TCP connection.
    /// Falls through with a warning once `timeout_ms` elapses.
    Probe {
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_probe_interval_ms")]
        interval_ms: u64,
    },
}

impl Default for StartupWait {
    fn default() -> Self {
        Self::Fixed {
            delay_ms: constants::DEFAULT_STARTUP_DELAY_MS,
        }
    }
}

impl StartupWait {
    /// Fixed grace period.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed {
            delay_ms: duration_ms(delay),
        }
    }

    /// Port probe with the given overall timeout and default poll interval.
    pub fn probe(timeout: Duration) -> Self {
        Self::Probe {
            timeout_ms: duration_ms(timeout),
            interval_ms: constants::DEFAULT_PROBE_INTERVAL_MS,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Full configuration of a mini cluster.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Working directory. Must be absent or an empty directory.
    pub dir: PathBuf,
    /// Instance name passed to the initializer.
    pub instance_name: String,
    /// Root credential passed to the initializer and the trace token.
    pub root_password: String,
    /// Client port of the coordination service.
    #[serde(default = "default_coordination_port")]
    pub coordination_port: u16,
    /// Number of worker processes.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Site config overrides. A key here suppresses the built-in default.
    #[serde(default)]
    pub site_config: BTreeMap<String, String>,
    /// Coordination-service config overrides.
    #[serde(default)]
    pub coordination_config: Option<BTreeMap<String, String>>,
    /// Executable used to launch every role. `None` means the current binary.
    #[serde(default)]
    pub launcher: Option<PathBuf>,
    /// Inherited search path for role executables.
    #[serde(default = "class_path_from_env")]
    pub class_path: Vec<PathBuf>,
    /// Library directory mirrored into `lib/`.
    #[serde(default = "lib_source_from_env")]
    pub lib_source: Option<PathBuf>,
    /// Heap bound for each role, e.g. `128m`.
    #[serde(default = "default_max_heap")]
    pub max_heap: String,
    /// Startup grace before the initializer runs.
    #[serde(default)]
    pub startup_wait: StartupWait,
    /// Interval of the periodic log flush.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_coordination_port() -> u16 {
    ports::free_port().unwrap_or(constants::FALLBACK_COORDINATION_PORT)
}

const fn default_workers() -> usize {
    constants::DEFAULT_WORKERS
}

fn default_max_heap() -> String {
    constants::DEFAULT_MAX_HEAP.to_string()
}

const fn default_startup_delay_ms() -> u64 {
    constants::DEFAULT_STARTUP_DELAY_MS
}

const fn default_probe_timeout_ms() -> u64 {
    constants::DEFAULT_PROBE_TIMEOUT_MS
}

const fn default_probe_interval_ms() -> u64 {
    constants::DEFAULT_PROBE_INTERVAL_MS
}

const fn default_flush_interval_ms() -> u64 {
    constants::DEFAULT_FLUSH_INTERVAL_MS
}

fn class_path_from_env() -> Vec<PathBuf> {
    env::var_os(constants::ENV_CLASS_PATH)
        .map(|value| env::split_paths(&value).collect())
        .unwrap_or_default()
}

fn lib_source_from_env() -> Option<PathBuf> {
    env::var_os(constants::ENV_HOME).map(|home| PathBuf::from(home).join(constants::LIB_DIR))
}

impl ClusterConfig {
    /// Configuration with defaults for everything but the three required values.
    ///
    /// Allocates an ephemeral coordination port.
    pub fn new(
        dir: impl Into<PathBuf>,
        instance_name: impl Into<String>,
        root_password: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            instance_name: instance_name.into(),
            root_password: root_password.into(),
            coordination_port: default_coordination_port(),
            workers: default_workers(),
            site_config: BTreeMap::new(),
            coordination_config: None,
            launcher: None,
            class_path: class_path_from_env(),
            lib_source: lib_source_from_env(),
            max_heap: default_max_heap(),
            startup_wait: StartupWait::default(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Self::from_toml(&content)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check values that would only fail much later, inside a child process.
    pub fn validate(&self) -> Result<()> {
        if self.instance_name.trim().is_empty() {
            return Err(Error::config("instance name cannot be empty"));
        }
        if self.coordination_port == 0 {
            return Err(Error::config("coordination port cannot be 0"));
        }
        if parse_size(&self.max_heap).is_none() {
            return Err(Error::config(format!(
                "invalid max heap '{}' (expected e.g. 128m)",
                self.max_heap
            )));
        }
        if self.flush_interval_ms == 0 {
            return Err(Error::config("flush interval must be positive"));
        }
        if let StartupWait::Probe { interval_ms: 0, .. } = self.startup_wait {
            return Err(Error::config("probe interval must be positive"));
        }
        Ok(())
    }

    /// Set the number of worker processes.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the coordination-service client port.
    #[must_use]
    pub fn with_coordination_port(mut self, port: u16) -> Self {
        self.coordination_port = port;
        self
    }

    /// Add a site config override.
    #[must_use]
    pub fn with_site_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.site_config.insert(key.into(), value.into());
        self
    }

    /// Add a coordination-service config override.
    #[must_use]
    pub fn with_coordination_config(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.coordination_config
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Use `path` instead of the current executable to launch roles.
    #[must_use]
    pub fn with_launcher(mut self, path: impl Into<PathBuf>) -> Self {
        self.launcher = Some(path.into());
        self
    }

    /// Replace the inherited role search path.
    #[must_use]
    pub fn with_class_path<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.class_path = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Set (or clear) the library directory seeded into `lib/`.
    #[must_use]
    pub fn with_lib_source(mut self, source: Option<PathBuf>) -> Self {
        self.lib_source = source;
        self
    }

    /// Set the per-role heap bound.
    #[must_use]
    pub fn with_max_heap(mut self, max_heap: impl Into<String>) -> Self {
        self.max_heap = max_heap.into();
        self
    }

    /// Set how `start()` waits for the coordination service.
    #[must_use]
    pub fn with_startup_wait(mut self, wait: StartupWait) -> Self {
        self.startup_wait = wait;
        self
    }

    /// Set the periodic log flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = duration_ms(interval);
        self
    }

    /// Periodic log flush interval.
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = ClusterConfig::new("/tmp/x", "test1", "secret");
        assert_eq!(config.instance_name, "test1");
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_heap, "128m");
        assert_ne!(config.coordination_port, 0);
        assert_eq!(config.startup_wait, StartupWait::Fixed { delay_ms: 250 });
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
        assert!(config.site_config.is_empty());
        assert!(config.coordination_config.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClusterConfig::new("/tmp/x", "test1", "secret")
            .with_workers(4)
            .with_coordination_port(21810)
            .with_site_config("worker.cache.data.size", "20M")
            .with_coordination_config("tickTime", "500")
            .with_startup_wait(StartupWait::probe(Duration::from_secs(2)));

        assert_eq!(config.workers, 4);
        assert_eq!(config.coordination_port, 21810);
        assert_eq!(config.site_config["worker.cache.data.size"], "20M");
        assert_eq!(config.coordination_config.unwrap()["tickTime"], "500");
        assert_eq!(
            config.startup_wait,
            StartupWait::Probe {
                timeout_ms: 2000,
                interval_ms: 50
            }
        );
    }

    #[test]
    fn test_from_toml_minimal() {
        let config = ClusterConfig::from_toml(
            r#"
dir = "/tmp/cluster"
instance_name = "test1"
root_password = "secret"
"#,
        )
        .unwrap();

        assert_eq!(config.dir, PathBuf::from("/tmp/cluster"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.flush_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_full() {
        let config = ClusterConfig::from_toml(
            r#"
dir = "/tmp/cluster"
instance_name = "test1"
root_password = "secret"
coordination_port = 22181
workers = 3
launcher = "/usr/local/bin/minicluster"
class_path = ["/opt/roles"]
max_heap = "256m"
flush_interval_ms = 200

[site_config]
"worker.cache.data.size" = "20M"

[coordination_config]
maxClientCnxns = "10"

[startup_wait]
mode = "probe"
timeout_ms = 5000
"#,
        )
        .unwrap();

        assert_eq!(config.coordination_port, 22181);
        assert_eq!(config.workers, 3);
        assert_eq!(
            config.launcher.as_deref(),
            Some(Path::new("/usr/local/bin/minicluster"))
        );
        assert_eq!(config.class_path, vec![PathBuf::from("/opt/roles")]);
        assert_eq!(config.site_config.len(), 1);
        assert_eq!(config.coordination_config.unwrap()["maxClientCnxns"], "10");
        assert_eq!(
            config.startup_wait,
            StartupWait::Probe {
                timeout_ms: 5000,
                interval_ms: 50
            }
        );
    }

    #[test]
    fn test_from_toml_rejects_unknown_field() {
        let result = ClusterConfig::from_toml(
            r#"
dir = "/tmp/cluster"
instance_name = "test1"
root_password = "secret"
tablet_servers = 2
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = ClusterConfig::new("/tmp/x", "test1", "secret");

        assert!(base.clone().with_max_heap("lots").validate().is_err());
        assert!(base.clone().with_coordination_port(0).validate().is_err());
        assert!(
            base.clone()
                .with_flush_interval(Duration::ZERO)
                .validate()
                .is_err()
        );

        let mut unnamed = base;
        unnamed.instance_name = "  ".to_string();
        assert!(matches!(unnamed.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ClusterConfig::load_from("/nonexistent/cluster.toml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
