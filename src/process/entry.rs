//! Role entry point, run inside the spawned process.
//!
//! The launcher's hidden `exec` subcommand ends up here: it finds the role
//! executable on the class path, bounds the data segment and replaces the
//! current process image with the role.

use std::convert::Infallible;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Find `entry` as a file in the first class-path directory containing it.
///
/// Only bare names are accepted; anything with a path separator is rejected
/// so an entry cannot escape the class path.
pub fn resolve_entry(class_path: &OsStr, entry: &str) -> Option<PathBuf> {
    let mut components = Path::new(entry).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return None;
    }

    env::split_paths(class_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(entry))
        .find(|candidate| candidate.is_file())
}

/// Resolve `entry`, apply the heap bound and replace this process with it.
///
/// Only returns on failure.
pub fn exec_entry(
    class_path: &OsStr,
    max_heap: Option<u64>,
    entry: &str,
    args: &[OsString],
) -> Result<Infallible> {
    let program = resolve_entry(class_path, entry).ok_or_else(|| {
        Error::config(format!(
            "entry '{entry}' not found on class path {}",
            class_path.to_string_lossy()
        ))
    })?;

    if let Some(bytes) = max_heap {
        limit_data_segment(bytes)?;
    }

    tracing::debug!(entry = entry, program = %program.display(), "Replacing process with role");
    replace_process(&program, args)
}

#[cfg(unix)]
fn replace_process(program: &Path, args: &[OsString]) -> Result<Infallible> {
    use std::os::unix::process::CommandExt;

    let err = std::process::Command::new(program).args(args).exec();
    Err(Error::io(format!("executing {}", program.display()), err))
}

#[cfg(not(unix))]
fn replace_process(program: &Path, args: &[OsString]) -> Result<Infallible> {
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::io(format!("executing {}", program.display()), e))?;
    std::process::exit(status.code().unwrap_or(1));
}

/// Lower the soft data-segment limit to `bytes`, never above the hard limit.
#[cfg(unix)]
fn limit_data_segment(bytes: u64) -> Result<()> {
    use nix::sys::resource::{getrlimit, setrlimit, Resource};

    let (_, hard) = getrlimit(Resource::RLIMIT_DATA)
        .map_err(|e| Error::io("reading data limit", e.into()))?;
    setrlimit(Resource::RLIMIT_DATA, bytes.min(hard), hard)
        .map_err(|e| Error::io("setting data limit", e.into()))
}

#[cfg(not(unix))]
fn limit_data_segment(_bytes: u64) -> Result<()> {
    Ok(())
}
