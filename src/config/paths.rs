//! Host mount points.

use std::path::{Component, Path, PathBuf};

/// Default procfs mount point
pub const DEFAULT_PROCFS: &str = "/proc";
/// Default sysfs mount point
pub const DEFAULT_SYSFS: &str = "/sys";
/// Default root filesystem mount point
pub const DEFAULT_ROOTFS: &str = "/";

/// Locations of the host filesystems collectors read from.
///
/// Running inside a container usually means the host's `/proc` and `/sys` are
/// bind-mounted elsewhere; collectors resolve every path through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    procfs: PathBuf,
    sysfs: PathBuf,
    rootfs: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROCFS, DEFAULT_SYSFS, DEFAULT_ROOTFS)
    }
}

impl PathConfig {
    /// Create from mount points; each one is lexically cleaned.
    pub fn new(
        procfs: impl AsRef<Path>,
        sysfs: impl AsRef<Path>,
        rootfs: impl AsRef<Path>,
    ) -> Self {
        Self {
            procfs: clean_path(procfs.as_ref()),
            sysfs: clean_path(sysfs.as_ref()),
            rootfs: clean_path(rootfs.as_ref()),
        }
    }

    /// procfs mount point
    pub fn procfs(&self) -> &Path {
        &self.procfs
    }

    /// sysfs mount point
    pub fn sysfs(&self) -> &Path {
        &self.sysfs
    }

    /// Root filesystem mount point
    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Path of `name` below procfs.
    pub fn proc_file_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.procfs.join(name)
    }

    /// Path of `name` below sysfs.
    pub fn sys_file_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.sysfs.join(name)
    }

    /// Path of `name` below the root filesystem. Absolute names are re-rooted.
    pub fn rootfs_file_path(&self, name: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = name
            .as_ref()
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.rootfs.join(relative)
    }
}

/// Drop `.` segments and trailing separators without touching the filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
