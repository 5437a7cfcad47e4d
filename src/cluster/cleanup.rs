//! Process-wide teardown of clusters that were never stopped.
//!
//! A started cluster installs a [`CleanupEntry`] here. The entry is removed
//! either by an explicit `stop()` or by the exit hook; whichever removes it
//! runs the teardown, so it happens at most once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Once};
use uuid::Uuid;

use crate::process::{LogRegistry, ManagedProcess};

static ENTRIES: LazyLock<Mutex<HashMap<Uuid, Arc<CleanupEntry>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static EXIT_HOOK: Once = Once::new();

/// Signalled processes and log writers of one cluster.
#[derive(Debug, Default)]
pub(crate) struct CleanupEntry {
    processes: Mutex<Vec<ManagedProcess>>,
    logs: LogRegistry,
}

impl CleanupEntry {
    /// Track a long-running process for teardown.
    pub(crate) fn track(&self, process: ManagedProcess) {
        self.processes.lock().push(process);
    }

    pub(crate) fn logs(&self) -> &LogRegistry {
        &self.logs
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.processes.lock().len()
    }

    /// Terminate tracked processes in stop order, then flush every writer.
    ///
    /// Never fails; problems are logged.
    pub(crate) fn run(&self) {
        let mut processes = std::mem::take(&mut *self.processes.lock());
        processes.sort_by_key(|p| p.role().stop_order());

        for process in &mut processes {
            process.terminate();
        }

        for writer in self.logs.drain() {
            if let Err(e) = writer.flush() {
                tracing::debug!(log = %writer.path().display(), error = %e, "Ignoring flush failure on stop");
            }
        }
    }
}

/// Register `entry` under `id`, installing the exit hook on first use.
pub(crate) fn install(id: Uuid, entry: Arc<CleanupEntry>) {
    ENTRIES.lock().insert(id, entry);
    EXIT_HOOK.call_once(register_exit_hook);
}

/// Remove the entry for `id`. `None` if it was never installed or is gone.
pub(crate) fn uninstall(id: Uuid) -> Option<Arc<CleanupEntry>> {
    ENTRIES.lock().remove(&id)
}

#[cfg(test)]
pub(crate) fn is_installed(id: Uuid) -> bool {
    ENTRIES.lock().contains_key(&id)
}

fn run_all() {
    let entries: Vec<Arc<CleanupEntry>> = ENTRIES.lock().drain().map(|(_, e)| e).collect();
    for entry in entries {
        entry.run();
    }
}

extern "C" fn exit_hook() {
    run_all();
}

#[cfg(unix)]
#[allow(unsafe_code)] // SAFETY: atexit with a plain extern "C" fn that never unwinds across FFI
fn register_exit_hook() {
    use nix::libc;

    // SAFETY: `exit_hook` has the signature atexit expects and lives for the
    // whole program.
    let rc = unsafe { libc::atexit(exit_hook) };
    if rc != 0 {
        tracing::warn!("Failed to register exit hook; unstopped clusters will leak processes");
    }
}

#[cfg(not(unix))]
fn register_exit_hook() {
    let _ = exit_hook;
}
