//! The `run` stage: re-executes the current binary in fresh namespaces.
//!
//! The new UTS, PID and mount namespaces only exist for processes created
//! with them, so the launcher clones a child directly into them and has it
//! exec `/proc/self/exe child ...`. Everything namespace-scoped happens in
//! that re-executed image; the launcher only waits and reports the exit
//! code.

use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;

use alchemist_common::config::LaunchConfig;
use alchemist_common::constants::{BIN_NAME, CHILD_STAGE_ARG};
use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::LaunchPhase;
use alchemist_core::cgroup::CgroupHierarchy;
use alchemist_core::namespace::NamespaceSet;

/// Stack handed to the cloned child until it execs.
#[cfg(target_os = "linux")]
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Spawns the child stage and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Launcher {
    namespaces: NamespaceSet,
}

impl Launcher {
    /// Creates a launcher requesting UTS, PID and mount namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `command` inside a new container and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns a usage error for an empty command or an argument holding a
    /// NUL byte, and a launch error if the child cannot be cloned or
    /// awaited.
    pub fn launch(&self, config: &LaunchConfig, command: &[String]) -> Result<i32> {
        if command.is_empty() {
            return Err(AlchemistError::Usage {
                message: "run requires a command".into(),
            });
        }
        config.validate()?;
        tracing::info!(phase = %LaunchPhase::Parsed, ?command, cgroup = %config.cgroup_name, "launching");

        let argv = to_cstrings(&child_args(config, command))?;
        let pid = self.spawn(&argv)?;
        tracing::info!(phase = %LaunchPhase::NamespacesRequested, pid, "child cloned");

        let code = wait(pid)?;
        tracing::info!(phase = %LaunchPhase::Terminated, pid, code, "child exited");
        remove_cgroup(config);
        Ok(code)
    }

    #[cfg(target_os = "linux")]
    fn spawn(&self, argv: &[CString]) -> Result<i32> {
        use nix::sched::clone;

        let exe = CString::new(alchemist_common::constants::SELF_EXE).map_err(|e| {
            AlchemistError::Launch {
                message: e.to_string(),
            }
        })?;
        let mut stack = vec![0u8; CHILD_STACK_SIZE];
        let callback = Box::new(|| enter_child(&exe, argv));

        // SAFETY: without CLONE_VM the child runs on its own copy of the
        // address space, and the callback only remounts and execs.
        let pid = unsafe {
            clone(
                callback,
                &mut stack,
                self.namespaces.clone_flags(),
                Some(libc::SIGCHLD),
            )
        }
        .map_err(|e| AlchemistError::Launch {
            message: format!("clone failed: {e}"),
        })?;
        Ok(pid.as_raw())
    }

    #[cfg(not(target_os = "linux"))]
    fn spawn(&self, _argv: &[CString]) -> Result<i32> {
        Err(AlchemistError::Config {
            message: "Linux required for native container operations".into(),
        })
    }
}

/// Deletes the child's `pids` group once every member has exited.
///
/// `notify_on_release` only matters when a release agent is installed, so
/// the launcher removes the group itself. Failure is logged, not returned.
pub fn remove_cgroup(config: &LaunchConfig) {
    let hierarchy = CgroupHierarchy::new(&config.cgroup_root);
    if let Err(e) = hierarchy.remove_group(&config.cgroup_name) {
        tracing::warn!(cgroup = %config.cgroup_name, error = %e, "cgroup left behind");
    }
}

/// Builds the argument vector of the re-executed child stage.
///
/// The resolved configuration travels as explicit flags; the command
/// follows `--` untouched.
#[must_use]
pub fn child_args(config: &LaunchConfig, command: &[String]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        BIN_NAME.into(),
        CHILD_STAGE_ARG.into(),
        "--maxpid".into(),
        config.max_pids.get().to_string().into(),
        "--hostname".into(),
        config.hostname.clone().into(),
        "--cgroup-root".into(),
        config.cgroup_root.clone().into(),
        "--cgroup-name".into(),
        config.cgroup_name.as_str().into(),
        "--policy".into(),
        config.failure_policy.to_string().into(),
    ];
    if let Some(rootfs) = &config.rootfs {
        args.push("--rootfs".into());
        args.push(rootfs.clone().into());
    }
    args.push("--".into());
    args.extend(command.iter().map(OsString::from));
    args
}

fn to_cstrings(args: &[OsString]) -> Result<Vec<CString>> {
    args.iter()
        .map(|arg| {
            CString::new(arg.as_bytes()).map_err(|_| AlchemistError::Usage {
                message: format!("argument contains a NUL byte: {}", arg.to_string_lossy()),
            })
        })
        .collect()
}

/// Runs in the cloned child: makes mounts private, then re-executes.
#[cfg(target_os = "linux")]
fn enter_child(exe: &std::ffi::CStr, argv: &[CString]) -> isize {
    if let Err(e) = alchemist_core::namespace::mount::make_mounts_private() {
        tracing::error!(error = %e, "cannot isolate mount propagation");
        return e.exit_code() as isize;
    }
    match nix::unistd::execv(exe, argv) {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, "re-exec of {} failed", exe.to_string_lossy());
            127
        }
    }
}

#[cfg(target_os = "linux")]
fn wait(pid: i32) -> Result<i32> {
    use nix::errno::Errno;
    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::Pid;

    loop {
        match waitpid(Pid::from_raw(pid), None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => {
                return Err(AlchemistError::Launch {
                    message: format!("waitpid({pid}) failed: {e}"),
                });
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn wait(_pid: i32) -> Result<i32> {
    Err(AlchemistError::Config {
        message: "Linux required for native container operations".into(),
    })
}
