//! Process management for cluster roles.
//!
//! - [`types`]: roles, launch specs and launch records
//! - [`launch`]: spawning roles and signalling them
//! - [`capture`]: per-stream log capture and the periodic flush
//! - [`entry`]: the in-child entry point behind `minicluster exec`
//! - [`health`]: liveness by pid and port readiness

pub mod capture;
pub mod entry;
pub mod health;
pub mod launch;
pub mod types;

pub use capture::{FlushScheduler, LogRegistry, LogWriter};
pub use health::{is_running, wait_for_port};
pub use launch::{Launcher, ManagedProcess};
pub use types::{LaunchSpec, ProcessRecord, Role};
