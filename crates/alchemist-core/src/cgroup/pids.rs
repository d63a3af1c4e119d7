//! Process-count control via the cgroup v1 `pids` controller.
//!
//! Manages `pids.max`, `notify_on_release` and `cgroup.procs` of a single
//! group directory.

use std::path::{Path, PathBuf};

use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::PidLimit;

/// Maximum number of live tasks in the group.
pub const PIDS_MAX: &str = "pids.max";
/// Set to `1` to let the kernel reap the group once it empties.
pub const NOTIFY_ON_RELEASE: &str = "notify_on_release";
/// Membership list, one PID per line.
pub const CGROUP_PROCS: &str = "cgroup.procs";

/// Handle to one group directory under the `pids` controller.
#[derive(Debug, Clone)]
pub struct PidsCgroup {
    path: PathBuf,
}

impl PidsCgroup {
    /// Creates (or reuses) the group directory `controller_root/name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(controller_root: &Path, name: &str) -> Result<Self> {
        let path = controller_root.join(name);
        match std::fs::create_dir(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "cgroup created"),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "cgroup already exists");
            }
            Err(e) => return Err(AlchemistError::Io { path, source: e }),
        }
        Ok(Self { path })
    }

    /// Returns the group directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the process-count ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `pids.max` fails.
    pub fn set_max(&self, limit: PidLimit) -> Result<()> {
        self.write_file(PIDS_MAX, &limit.get().to_string())?;
        tracing::debug!(max = limit.get(), "pids limit set");
        Ok(())
    }

    /// Asks the kernel to release the group once its last member exits.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `notify_on_release` fails.
    pub fn enable_release_notify(&self) -> Result<()> {
        self.write_file(NOTIFY_ON_RELEASE, "1")
    }

    /// Moves a process into this group.
    ///
    /// The kernel ignores a PID that is already a member, so repeating the
    /// call is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `cgroup.procs` fails.
    pub fn add_process(&self, pid: u32) -> Result<()> {
        self.write_file(CGROUP_PROCS, &pid.to_string())?;
        tracing::debug!(pid, "added process to cgroup");
        Ok(())
    }

    /// Lists the PIDs currently in the group.
    ///
    /// # Errors
    ///
    /// Returns an error if `cgroup.procs` cannot be read.
    pub fn members(&self) -> Result<Vec<u32>> {
        let content = self.read_file(CGROUP_PROCS)?;
        let mut pids: Vec<u32> = content
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        pids.sort_unstable();
        pids.dedup();
        Ok(pids)
    }

    /// Reads a control file back verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> Result<String> {
        let file = self.path.join(name);
        std::fs::read_to_string(&file).map_err(|e| AlchemistError::Io {
            path: file,
            source: e,
        })
    }

    fn write_file(&self, name: &str, value: &str) -> Result<()> {
        let file = self.path.join(name);
        std::fs::write(&file, value).map_err(|e| AlchemistError::CgroupWrite {
            path: file,
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> (tempfile::TempDir, PidsCgroup) {
        let dir = tempfile::tempdir().unwrap();
        let cgroup = PidsCgroup::create(dir.path(), "alchemist-test").unwrap();
        (dir, cgroup)
    }

    #[test]
    fn create_makes_group_directory() {
        let (dir, cgroup) = group();
        assert!(dir.path().join("alchemist-test").is_dir());
        assert_eq!(cgroup.path(), dir.path().join("alchemist-test"));
    }

    #[test]
    fn create_reuses_existing_directory() {
        let (dir, _cgroup) = group();
        assert!(PidsCgroup::create(dir.path(), "alchemist-test").is_ok());
    }

    #[test]
    fn create_fails_without_controller_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = PidsCgroup::create(&dir.path().join("missing"), "x");
        assert!(matches!(result, Err(AlchemistError::Io { .. })));
    }

    #[test]
    fn set_max_writes_decimal_value() {
        let (_dir, cgroup) = group();
        cgroup.set_max(PidLimit::new(7)).unwrap();
        assert_eq!(cgroup.read_file(PIDS_MAX).unwrap(), "7");
    }

    #[test]
    fn written_value_reads_back_unchanged() {
        let (_dir, cgroup) = group();
        cgroup.enable_release_notify().unwrap();
        assert_eq!(cgroup.read_file(NOTIFY_ON_RELEASE).unwrap(), "1");
    }

    #[test]
    fn re_adding_a_member_does_not_duplicate_it() {
        let (_dir, cgroup) = group();
        cgroup.add_process(4242).unwrap();
        cgroup.add_process(4242).unwrap();
        assert_eq!(cgroup.members().unwrap(), vec![4242]);
    }

    #[test]
    fn write_into_removed_group_is_a_cgroup_write_error() {
        let (_dir, cgroup) = group();
        std::fs::remove_dir(cgroup.path()).unwrap();
        assert!(matches!(
            cgroup.set_max(PidLimit::default()),
            Err(AlchemistError::CgroupWrite { .. })
        ));
    }
}
