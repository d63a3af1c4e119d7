//! Isolation of the child process inside its fresh namespaces.
//!
//! [`isolate`] runs the steps in a fixed order: hostname, optional
//! chroot, `chdir("/")`, then a new `/proc`. The first failing step
//! aborts the sequence. The OS calls sit behind [`IsolationOps`] so the
//! sequence can be driven against a recording double.

use std::path::Path;

use alchemist_common::constants::PROC_TARGET;
use alchemist_common::error::Result;

/// The OS operations performed while isolating a process.
pub trait IsolationOps {
    /// Sets the UTS hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname cannot be set.
    fn set_hostname(&mut self, hostname: &str) -> Result<()>;

    /// Changes the root filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be changed.
    fn change_root(&mut self, new_root: &Path) -> Result<()>;

    /// Resets the working directory to `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be changed.
    fn enter_root(&mut self) -> Result<()>;

    /// Mounts a fresh `proc` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_proc(&mut self, target: &Path) -> Result<()>;

    /// Unmounts the `proc` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount_proc(&mut self, target: &Path) -> Result<()>;
}

/// [`IsolationOps`] backed by the real syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxIsolation;

impl IsolationOps for LinuxIsolation {
    fn set_hostname(&mut self, hostname: &str) -> Result<()> {
        crate::namespace::uts::set_hostname(hostname)
    }

    fn change_root(&mut self, new_root: &Path) -> Result<()> {
        crate::filesystem::chroot::change_root(new_root)
    }

    fn enter_root(&mut self) -> Result<()> {
        crate::filesystem::chroot::enter_root()
    }

    fn mount_proc(&mut self, target: &Path) -> Result<()> {
        crate::filesystem::mount::mount_proc(target)
    }

    fn unmount_proc(&mut self, target: &Path) -> Result<()> {
        crate::filesystem::mount::unmount(target)
    }
}

/// Isolates the calling process.
///
/// Must run exactly once, after the process is already inside its own
/// UTS, PID and mount namespaces. On success a `proc` instance is mounted
/// at [`PROC_TARGET`] relative to the new root; call [`release`] once the
/// workload is done.
///
/// # Errors
///
/// Returns the error of the first step that fails; later steps are not
/// attempted.
pub fn isolate<O: IsolationOps + ?Sized>(
    ops: &mut O,
    hostname: &str,
    rootfs: Option<&Path>,
) -> Result<()> {
    ops.set_hostname(hostname)?;
    if let Some(root) = rootfs {
        ops.change_root(root)?;
    }
    ops.enter_root()?;
    ops.mount_proc(Path::new(PROC_TARGET))?;
    tracing::info!(hostname, rootfs = ?rootfs, "process isolated");
    Ok(())
}

/// Tears down what [`isolate`] mounted.
///
/// # Errors
///
/// Returns an error if `/proc` cannot be unmounted.
pub fn release<O: IsolationOps + ?Sized>(ops: &mut O) -> Result<()> {
    ops.unmount_proc(Path::new(PROC_TARGET))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use alchemist_common::error::AlchemistError;
    use alchemist_common::types::IsolationStep;

    use super::*;

    /// Call recorded by [`RecordingOps`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Hostname(String),
        Chroot(PathBuf),
        Chdir,
        MountProc(PathBuf),
        UnmountProc(PathBuf),
    }

    /// Records every call and optionally fails one step.
    #[derive(Debug, Default)]
    pub struct RecordingOps {
        pub calls: Vec<Call>,
        pub fail_at: Option<IsolationStep>,
    }

    impl RecordingOps {
        fn outcome(&self, step: IsolationStep) -> Result<()> {
            if self.fail_at == Some(step) {
                return Err(AlchemistError::Isolation {
                    step,
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            Ok(())
        }
    }

    impl IsolationOps for RecordingOps {
        fn set_hostname(&mut self, hostname: &str) -> Result<()> {
            self.calls.push(Call::Hostname(hostname.to_owned()));
            self.outcome(IsolationStep::Hostname)
        }

        fn change_root(&mut self, new_root: &Path) -> Result<()> {
            self.calls.push(Call::Chroot(new_root.to_path_buf()));
            self.outcome(IsolationStep::Chroot)
        }

        fn enter_root(&mut self) -> Result<()> {
            self.calls.push(Call::Chdir);
            self.outcome(IsolationStep::Chdir)
        }

        fn mount_proc(&mut self, target: &Path) -> Result<()> {
            self.calls.push(Call::MountProc(target.to_path_buf()));
            self.outcome(IsolationStep::MountProc)
        }

        fn unmount_proc(&mut self, target: &Path) -> Result<()> {
            self.calls.push(Call::UnmountProc(target.to_path_buf()));
            Ok(())
        }
    }

    #[test]
    fn steps_run_in_fixed_order() {
        let mut ops = RecordingOps::default();
        isolate(&mut ops, "container", Some(Path::new("/tmp/alpine-minifs"))).unwrap();
        assert_eq!(
            ops.calls,
            vec![
                Call::Hostname("container".into()),
                Call::Chroot(PathBuf::from("/tmp/alpine-minifs")),
                Call::Chdir,
                Call::MountProc(PathBuf::from("proc")),
            ]
        );
    }

    #[test]
    fn chroot_is_skipped_without_rootfs() {
        let mut ops = RecordingOps::default();
        isolate(&mut ops, "box", None).unwrap();
        assert_eq!(
            ops.calls,
            vec![
                Call::Hostname("box".into()),
                Call::Chdir,
                Call::MountProc(PathBuf::from("proc")),
            ]
        );
    }

    #[test]
    fn failed_chroot_stops_the_sequence() {
        let mut ops = RecordingOps {
            fail_at: Some(IsolationStep::Chroot),
            ..RecordingOps::default()
        };
        let err = isolate(&mut ops, "container", Some(Path::new("/missing"))).unwrap_err();
        assert!(matches!(
            err,
            AlchemistError::Isolation {
                step: IsolationStep::Chroot,
                ..
            }
        ));
        assert_eq!(ops.calls.len(), 2);
        assert!(!ops.calls.iter().any(|c| matches!(c, Call::MountProc(_))));
    }

    #[test]
    fn failed_hostname_attempts_nothing_else() {
        let mut ops = RecordingOps {
            fail_at: Some(IsolationStep::Hostname),
            ..RecordingOps::default()
        };
        assert!(isolate(&mut ops, "container", None).is_err());
        assert_eq!(ops.calls, vec![Call::Hostname("container".into())]);
    }

    #[test]
    fn release_unmounts_proc_relative_to_root() {
        let mut ops = RecordingOps::default();
        release(&mut ops).unwrap();
        assert_eq!(ops.calls, vec![Call::UnmountProc(PathBuf::from("proc"))]);
    }
}
