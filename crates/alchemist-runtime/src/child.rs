//! The in-namespace child stage.
//!
//! Runs inside the namespaces created by the launcher, in this order:
//! cgroup membership, isolation, the target command, `/proc` teardown.
//! Membership comes first so nothing the command forks escapes the
//! process-count limit.

use alchemist_common::config::LaunchConfig;
use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::{FailurePolicy, LaunchPhase};
use alchemist_core::cgroup::{CgroupHierarchy, PidsCgroup};
use alchemist_core::isolation::{self, IsolationOps, LinuxIsolation};

/// Entry point of the `child` stage.
///
/// Returns the target command's exit code.
///
/// # Errors
///
/// Returns an error if resource limiting fails under
/// [`FailurePolicy::Strict`], if isolation fails, or if the command
/// cannot be executed.
pub fn run(config: &LaunchConfig, command: &[String]) -> Result<i32> {
    tracing::info!(
        phase = %LaunchPhase::ChildRunning,
        pid = std::process::id(),
        cgroup = %config.cgroup_name,
        "child stage started"
    );
    let hierarchy = CgroupHierarchy::new(&config.cgroup_root);
    let _cgroup = apply_limits(&hierarchy, config)?;
    run_isolated(&mut LinuxIsolation, config, command)
}

/// Mounts the hierarchy and moves the calling process into its cgroup.
///
/// Returns `None` when a failure was tolerated by the policy.
///
/// # Errors
///
/// Returns the first mount or cgroup error under [`FailurePolicy::Strict`].
pub fn apply_limits(hierarchy: &CgroupHierarchy, config: &LaunchConfig) -> Result<Option<PidsCgroup>> {
    if let Err(e) = hierarchy.ensure_mounted() {
        tolerate(config.failure_policy, e)?;
    }
    match hierarchy.limit_processes(&config.cgroup_name, config.max_pids) {
        Ok(cgroup) => Ok(Some(cgroup)),
        Err(e) => {
            tolerate(config.failure_policy, e)?;
            Ok(None)
        }
    }
}

/// Decides whether a resource-limit failure aborts the launch.
///
/// Isolation and exec errors are never tolerated.
///
/// # Errors
///
/// Returns `err` unless the policy is lenient and `err` is a mount,
/// cgroup-write or I/O failure.
pub fn tolerate(policy: FailurePolicy, err: AlchemistError) -> Result<()> {
    let recoverable = matches!(
        err,
        AlchemistError::Mount { .. } | AlchemistError::CgroupWrite { .. } | AlchemistError::Io { .. }
    );
    if policy == FailurePolicy::Lenient && recoverable {
        tracing::warn!(error = %err, "resource limit not applied, continuing without it");
        return Ok(());
    }
    Err(err)
}

/// Isolates the process, runs the command and unmounts `/proc`.
///
/// The unmount runs whenever isolation succeeded, whatever the command's
/// outcome.
///
/// # Errors
///
/// Returns a usage error for an empty command, the isolation error of the
/// failing step, or the exec error of the command.
pub fn run_isolated<O: IsolationOps + ?Sized>(
    ops: &mut O,
    config: &LaunchConfig,
    command: &[String],
) -> Result<i32> {
    let (program, args) = command.split_first().ok_or_else(|| AlchemistError::Usage {
        message: "child stage requires a command".into(),
    })?;

    isolation::isolate(ops, &config.hostname, config.rootfs.as_deref())?;
    let outcome = crate::process::execute(program, args);
    if let Err(e) = isolation::release(ops) {
        tracing::warn!(error = %e, "failed to unmount /proc");
    }

    let code = crate::process::exit_code(outcome?);
    tracing::info!(code, "child stage finished");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use alchemist_common::types::{CgroupName, IsolationStep, PidLimit};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingOps {
        steps: Vec<&'static str>,
        fail_at: Option<IsolationStep>,
    }

    impl CountingOps {
        fn unmounts(&self) -> usize {
            self.steps.iter().filter(|s| **s == "unmount").count()
        }

        fn step(&mut self, name: &'static str, step: IsolationStep) -> Result<()> {
            self.steps.push(name);
            if self.fail_at == Some(step) {
                return Err(AlchemistError::Isolation {
                    step,
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            Ok(())
        }
    }

    impl IsolationOps for CountingOps {
        fn set_hostname(&mut self, _hostname: &str) -> Result<()> {
            self.step("hostname", IsolationStep::Hostname)
        }

        fn change_root(&mut self, _new_root: &Path) -> Result<()> {
            self.step("chroot", IsolationStep::Chroot)
        }

        fn enter_root(&mut self) -> Result<()> {
            self.step("chdir", IsolationStep::Chdir)
        }

        fn mount_proc(&mut self, _target: &Path) -> Result<()> {
            self.step("mount", IsolationStep::MountProc)
        }

        fn unmount_proc(&mut self, _target: &Path) -> Result<()> {
            self.steps.push("unmount");
            Ok(())
        }
    }

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn proc_is_unmounted_once_after_success() {
        let mut ops = CountingOps::default();
        let code = run_isolated(&mut ops, &LaunchConfig::default(), &command(&["true"])).unwrap();
        assert_eq!(code, 0);
        assert_eq!(ops.steps, vec!["hostname", "chdir", "mount", "unmount"]);
    }

    #[test]
    fn proc_is_unmounted_after_nonzero_exit() {
        let mut ops = CountingOps::default();
        let code = run_isolated(
            &mut ops,
            &LaunchConfig::default(),
            &command(&["sh", "-c", "exit 1"]),
        )
        .unwrap();
        assert_eq!(code, 1);
        assert_eq!(ops.unmounts(), 1);
    }

    #[test]
    fn missing_binary_still_unmounts_proc() {
        let mut ops = CountingOps::default();
        let err = run_isolated(
            &mut ops,
            &LaunchConfig::default(),
            &command(&["/nonexistent/binary"]),
        )
        .unwrap_err();
        assert!(matches!(err, AlchemistError::Exec { .. }));
        assert_eq!(ops.unmounts(), 1);
    }

    #[test]
    fn failed_isolation_never_runs_the_command_or_unmounts() {
        let mut ops = CountingOps {
            fail_at: Some(IsolationStep::MountProc),
            ..CountingOps::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = format!("touch {}", marker.display());

        let result = run_isolated(
            &mut ops,
            &LaunchConfig::default(),
            &command(&["sh", "-c", &script]),
        );

        assert!(result.is_err());
        assert!(!marker.exists());
        assert_eq!(ops.unmounts(), 0);
    }

    #[test]
    fn empty_command_is_rejected_before_isolation() {
        let mut ops = CountingOps::default();
        let result = run_isolated(&mut ops, &LaunchConfig::default(), &[]);
        assert!(matches!(result, Err(AlchemistError::Usage { .. })));
        assert!(ops.steps.is_empty());
    }

    #[test]
    fn lenient_policy_tolerates_cgroup_write_failures() {
        let err = AlchemistError::CgroupWrite {
            path: "/sys/fs/cgroup/pids/x/pids.max".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(tolerate(FailurePolicy::Lenient, err).is_ok());
    }

    #[test]
    fn strict_policy_propagates_mount_failures() {
        let err = AlchemistError::Mount {
            target: "/sys/fs/cgroup".into(),
            message: "EPERM".into(),
        };
        assert!(tolerate(FailurePolicy::Strict, err).is_err());
    }

    #[test]
    fn lenient_policy_never_tolerates_isolation_failures() {
        let err = AlchemistError::Isolation {
            step: IsolationStep::Chroot,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(tolerate(FailurePolicy::Lenient, err).is_err());
    }

    #[test]
    fn apply_limits_degrades_under_lenient_policy() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the hierarchy root should be makes every step fail.
        let root = dir.path().join("cgroup");
        std::fs::write(&root, "").unwrap();
        let config = LaunchConfig {
            cgroup_root: root.clone(),
            cgroup_name: CgroupName::new("alchemist").unwrap(),
            max_pids: PidLimit::new(5),
            failure_policy: FailurePolicy::Lenient,
            ..LaunchConfig::default()
        };

        let cgroup = apply_limits(&CgroupHierarchy::new(&root), &config).unwrap();
        assert!(cgroup.is_none());

        let strict = LaunchConfig {
            failure_policy: FailurePolicy::Strict,
            ..config
        };
        assert!(apply_limits(&CgroupHierarchy::new(&root), &strict).is_err());
    }
}
