//! Centralized constants for cluster defaults and well-known names.
//!
//! Everything the spawned processes see (directory names, environment
//! variables, config keys) is defined here so the launcher, the materializer
//! and the tests agree on one spelling.

// =============================================================================
// Lifecycle Defaults
// =============================================================================

/// Grace period between launching the coordination service and the initializer.
/// Empirical, not a readiness signal.
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 250;

/// Interval of the shared log flush scheduler.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Default number of worker processes.
pub const DEFAULT_WORKERS: usize = 2;

/// Coordination-service port used when no ephemeral port can be allocated.
pub const FALLBACK_COORDINATION_PORT: u16 = 2181;

/// Heap bound handed to every launched role.
pub const DEFAULT_MAX_HEAP: &str = "128m";

/// Timeout for the optional coordination-service port probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Poll interval for the optional coordination-service port probe.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 50;

// =============================================================================
// Directory Layout
// =============================================================================

pub const CONF_DIR: &str = "conf";
pub const DATA_DIR: &str = "data";
pub const COORDINATION_DATA_DIR: &str = "coordination-service-data";
pub const LOG_DIR: &str = "logs";
pub const WALOG_DIR: &str = "walog";
pub const LIB_DIR: &str = "lib";

/// Site configuration file inside `conf/`.
pub const SITE_CONFIG_FILE: &str = "cluster-site.xml";

/// Coordination-service configuration file inside `conf/`.
pub const COORDINATION_CONFIG_FILE: &str = "coordination.cfg";

// =============================================================================
// Environment
// =============================================================================

/// Cluster root, set on every spawned process. Also read from the
/// orchestrator's own environment to locate the library source.
pub const ENV_HOME: &str = "MINICLUSTER_HOME";

/// Log directory, set on every spawned process.
pub const ENV_LOG_DIR: &str = "MINICLUSTER_LOG_DIR";

/// Inherited role search path of the orchestrator.
pub const ENV_CLASS_PATH: &str = "MINICLUSTER_CLASSPATH";

// Copied from the orchestrator's environment when present.
pub const ENV_STORAGE_PREFIX: &str = "STORAGE_PREFIX";
pub const ENV_STORAGE_HOME: &str = "STORAGE_HOME";
pub const ENV_COORDINATION_HOME: &str = "COORDINATION_HOME";

// =============================================================================
// Site Configuration
// =============================================================================

/// Shared secret written into every site config.
pub const INSTANCE_SECRET: &str = "DONTTELL";

/// Site configuration keys.
pub mod site {
    pub const STORAGE_URI: &str = "instance.storage.uri";
    pub const STORAGE_DIR: &str = "instance.storage.dir";
    pub const COORDINATION_HOST: &str = "instance.coordination.host";
    pub const SECRET: &str = "instance.secret";
    pub const COORDINATOR_CLIENT_PORT: &str = "coordinator.port.client";
    pub const WORKER_CLIENT_PORT: &str = "worker.port.client";
    pub const WORKER_PORT_SEARCH: &str = "worker.port.search";
    pub const WALOG_DIR: &str = "logger.dir.walog";
    pub const DATA_CACHE_SIZE: &str = "worker.cache.data.size";
    pub const INDEX_CACHE_SIZE: &str = "worker.cache.index.size";
    pub const MAX_MEMORY: &str = "worker.memory.maps.max";
    pub const WALOG_MAX_SIZE: &str = "worker.walog.max.size";
    pub const NATIVE_MAPS_ENABLED: &str = "worker.memory.maps.native.enabled";
    pub const TRACE_PASSWORD: &str = "trace.token.property.password";
    pub const TRACE_PORT: &str = "trace.port.client";
    pub const MAJOR_COMPACTION_DELAY: &str = "worker.compaction.major.delay";
    pub const CLASSPATHS: &str = "general.classpaths";
    pub const DYNAMIC_CLASSPATHS: &str = "general.dynamic.classpaths";
}

// =============================================================================
// Coordination Service
// =============================================================================

pub const COORDINATION_TICK_TIME: u32 = 1000;
pub const COORDINATION_INIT_LIMIT: u32 = 10;
pub const COORDINATION_SYNC_LIMIT: u32 = 5;
pub const COORDINATION_MAX_CLIENT_CONNECTIONS: u32 = 100;
