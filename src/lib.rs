// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: deny unsafe by default, allow only where documented
// (atexit registration in cluster/cleanup.rs)
#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]

// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::missing_panics_doc)] // Panics only in tests
#![allow(clippy::module_name_repetitions)] // e.g., cluster::ClusterState is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Boots a throwaway multi-process cluster on the local host.
//!
//! A [`MiniCluster`] owns one working directory. Construction lays it out and
//! writes the configuration every role reads; [`MiniCluster::start`] launches
//! a coordination service, runs an initializer to completion, then launches
//! the workers and a coordinator. Every process's stdout and stderr land in
//! `logs/<role>_<pid>.out` and `.err`.
//!
//! Roles are opaque executables found on a class path. They are launched
//! through the `minicluster exec` entry point so the pid the cluster tracks is
//! the role's own.
//!
//! # Example
//!
//! ```no_run
//! use minicluster::{ClusterConfig, MiniCluster, StartupWait};
//! use std::time::Duration;
//!
//! # async fn example() -> minicluster::Result<()> {
//! let config = ClusterConfig::new("/tmp/cluster", "test1", "secret")
//!     .with_workers(3)
//!     .with_site_config("worker.cache.data.size", "20M")
//!     .with_startup_wait(StartupWait::probe(Duration::from_secs(5)));
//!
//! let mut cluster = MiniCluster::new(config)?;
//! cluster.start().await?;
//! for process in cluster.processes() {
//!     println!("{} {}", process.role, process.pid);
//! }
//! cluster.stop();
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod logging;
pub mod materialize;
pub mod process;
pub mod utils;

pub use cluster::{ClusterState, MiniCluster};
pub use config::{ClusterConfig, StartupWait};
pub use error::{Error, Result};
pub use process::{ProcessRecord, Role};
