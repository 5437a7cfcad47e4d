//! Working directory layout of a mini cluster.
//!
//! ```text
//! <root>/
//!   conf/                       cluster-site.xml, coordination.cfg
//!   data/                       storage root
//!   coordination-service-data/  coordination-service state
//!   logs/                       <role>_<pid>.out / .err
//!   walog/                      write-ahead logs
//!   lib/                        seeded library files
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Error, Result};

/// Absolute paths of every directory under the cluster root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLayout {
    pub root: PathBuf,
    pub conf: PathBuf,
    pub data: PathBuf,
    pub coordination_data: PathBuf,
    pub logs: PathBuf,
    pub walog: PathBuf,
    pub lib: PathBuf,
}

impl ClusterLayout {
    /// Compute the layout for `root` without touching the filesystem.
    ///
    /// Relative roots are resolved against the current directory so that
    /// every path written into config files is absolute.
    pub fn new(root: &Path) -> Result<Self> {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| Error::io("resolving current directory", e))?
                .join(root)
        };

        Ok(Self {
            conf: root.join(constants::CONF_DIR),
            data: root.join(constants::DATA_DIR),
            coordination_data: root.join(constants::COORDINATION_DATA_DIR),
            logs: root.join(constants::LOG_DIR),
            walog: root.join(constants::WALOG_DIR),
            lib: root.join(constants::LIB_DIR),
            root,
        })
    }

    /// Fail unless the root is absent or an empty directory.
    ///
    /// Performs no writes.
    pub fn validate_root(&self) -> Result<()> {
        let metadata = match fs::metadata(&self.root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(format!("inspecting {}", self.root.display()), e)),
        };

        if !metadata.is_dir() {
            return Err(Error::config(format!(
                "must pass in a directory, {} is a file",
                self.root.display()
            )));
        }

        let mut entries = fs::read_dir(&self.root)
            .map_err(|e| Error::io(format!("listing {}", self.root.display()), e))?;
        if entries.next().is_some() {
            return Err(Error::config(format!(
                "directory {} is not empty",
                self.root.display()
            )));
        }

        Ok(())
    }

    /// Create every directory of the layout (including the root).
    pub fn create(&self) -> Result<()> {
        for dir in [
            &self.conf,
            &self.data,
            &self.coordination_data,
            &self.logs,
            &self.walog,
            &self.lib,
        ] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    /// Mirror `source` into `lib/`.
    pub fn seed_library(&self, source: &Path) -> Result<()> {
        if !source.exists() {
            return Err(Error::config(format!(
                "library source {} does not exist",
                source.display()
            )));
        }
        copy_file_or_directory(source, &self.lib)
            .map_err(|e| Error::io(format!("copying library from {}", source.display()), e))?;

        tracing::debug!(
            source = %source.display(),
            dest = %self.lib.display(),
            "Seeded library directory"
        );
        Ok(())
    }
}

/// Recursively copy `src` onto `dest`.
///
/// Directories are mirrored, creating missing destination directories; files
/// are copied byte-for-byte and overwrite an existing destination file.
pub fn copy_file_or_directory(src: &Path, dest: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        if !dest.exists() {
            fs::create_dir(dest)?;
        }

        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_file_or_directory(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        fs::copy(src, dest)?;
    }

    Ok(())
}
