//! Cgroup v1 resource management.
//!
//! The launcher uses a v1 hierarchy: a `tmpfs` at the cgroup root with the
//! `pids` and `cpu` controllers mounted beneath it, or whatever layout the
//! host already has there. Only `pids` is configured; `cpu` is mounted when
//! possible so the layout matches a conventional v1 host.

pub mod pids;

use std::path::{Path, PathBuf};

use alchemist_common::constants::{CPU_CONTROLLER, PIDS_CONTROLLER};
use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::{CgroupName, PidLimit};

use crate::filesystem::mount::MountEntry;

pub use pids::PidsCgroup;

/// Handle to the cgroup hierarchy rooted at a mount point.
#[derive(Debug, Clone)]
pub struct CgroupHierarchy {
    root: PathBuf,
}

impl CgroupHierarchy {
    /// Creates a handle for the hierarchy at `root` without touching it.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the mount point of the `pids` controller.
    #[must_use]
    pub fn pids_root(&self) -> PathBuf {
        self.root.join(PIDS_CONTROLLER)
    }

    /// Mounts the hierarchy if it is not already in place.
    ///
    /// A `tmpfs` is mounted at the root when nothing is mounted there.
    /// Controllers already bound to a v1 hierarchy under the root are
    /// reused wherever they live (e.g. `cpu,cpuacct`); the others are
    /// mounted at `<root>/<controller>`. Only `pids` is required; a failed
    /// `cpu` mount is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is a cgroup v2 unified mount, or if the
    /// root or the `pids` controller cannot be mounted.
    pub fn ensure_mounted(&self) -> Result<()> {
        create_dir(&self.root)?;
        let mounts = crate::filesystem::mount::read_mountinfo()?;

        let fresh_root = match crate::filesystem::mount::find_mount(&mounts, &self.root) {
            Some(entry) if entry.fs_type == "cgroup2" => {
                return Err(AlchemistError::Mount {
                    target: self.root.clone(),
                    message: "cgroup v2 unified hierarchy is not supported".into(),
                });
            }
            Some(entry) => {
                tracing::debug!(root = %self.root.display(), fs = %entry.fs_type, "cgroup root already mounted");
                false
            }
            None => {
                crate::filesystem::mount::mount_tmpfs(&self.root)?;
                true
            }
        };

        for controller in self.missing_controllers(&mounts, fresh_root) {
            let target = self.root.join(controller);
            let mounted = create_dir(&target)
                .and_then(|()| crate::filesystem::mount::mount_cgroup_controller(controller, &target));
            match mounted {
                Ok(()) => {}
                Err(e) if controller == PIDS_CONTROLLER => return Err(e),
                Err(e) => tracing::warn!(controller, error = %e, "optional controller not mounted"),
            }
        }

        tracing::info!(root = %self.root.display(), "cgroup hierarchy ready");
        Ok(())
    }

    /// Controllers that still need a mount, given the current mount table.
    ///
    /// Everything is missing under a root that was just mounted.
    fn missing_controllers(&self, mounts: &[MountEntry], fresh_root: bool) -> Vec<&'static str> {
        [PIDS_CONTROLLER, CPU_CONTROLLER]
            .into_iter()
            .filter(|&controller| {
                let existing = (!fresh_root)
                    .then(|| crate::filesystem::mount::find_controller(mounts, &self.root, controller))
                    .flatten();
                if let Some(entry) = existing {
                    tracing::debug!(controller, at = %entry.mount_point.display(), "controller already mounted");
                }
                existing.is_none()
            })
            .collect()
    }

    /// Removes the group `name` from the `pids` controller.
    ///
    /// The kernel only allows this once the group has no members left. A
    /// group that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove_group(&self, name: &CgroupName) -> Result<()> {
        let path = self.pids_root().join(name.as_str());
        match std::fs::remove_dir(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "cgroup removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AlchemistError::Io { path, source: e }),
        }
    }

    /// Caps the number of live processes for the calling process.
    ///
    /// Creates the group `name` under the `pids` controller, writes the
    /// ceiling, enables release-on-empty and finally joins the group, so
    /// every process forked afterwards is accounted for.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be created or a control file
    /// cannot be written.
    pub fn limit_processes(&self, name: &CgroupName, limit: PidLimit) -> Result<PidsCgroup> {
        self.limit_process(name, limit, std::process::id())
    }

    /// Same as [`limit_processes`](Self::limit_processes) for an explicit PID.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be created or a control file
    /// cannot be written.
    pub fn limit_process(&self, name: &CgroupName, limit: PidLimit, pid: u32) -> Result<PidsCgroup> {
        let cgroup = PidsCgroup::create(&self.pids_root(), name.as_str())?;
        cgroup.set_max(limit)?;
        cgroup.enable_release_notify()?;
        cgroup.add_process(pid)?;
        tracing::info!(cgroup = %name, max_pids = limit.get(), pid, "process count limited");
        Ok(cgroup)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| AlchemistError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
