//! Mount utilities for container filesystem setup.
//!
//! Handles the pseudo-filesystems the launcher needs (`tmpfs` for the
//! cgroup root, `cgroup` controller mounts, `proc`) and answers "is this
//! path already a mount point" from the kernel's mount table.

use std::path::{Path, PathBuf};

use alchemist_common::error::{AlchemistError, Result};

/// Kernel view of the calling process's mount table.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// One line of `/proc/self/mountinfo`, reduced to what the launcher uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Absolute mount point.
    pub mount_point: PathBuf,
    /// Filesystem type (`tmpfs`, `cgroup`, `cgroup2`, `proc`, ...).
    pub fs_type: String,
    /// Superblock options, e.g. the controller list of a v1 cgroup mount.
    pub super_options: String,
}

/// Parses the contents of a `mountinfo` file.
///
/// Malformed lines are skipped.
#[must_use]
pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content.lines().filter_map(parse_mountinfo_line).collect()
}

// Format: id parent major:minor root mount_point options [optional...] - fstype source super_options
fn parse_mountinfo_line(line: &str) -> Option<MountEntry> {
    let (left, right) = line.split_once(" - ")?;
    let mount_point = left.split_whitespace().nth(4)?;
    let mut right = right.split_whitespace();
    let fs_type = right.next()?;
    let _source = right.next();
    let super_options = right.next().unwrap_or_default();
    Some(MountEntry {
        mount_point: PathBuf::from(unescape_octal(mount_point)),
        fs_type: fs_type.to_owned(),
        super_options: super_options.to_owned(),
    })
}

/// Decodes the `\ooo` escapes the kernel uses for spaces, tabs, newlines
/// and backslashes in mount paths.
fn unescape_octal(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                out.push(u8::try_from(value).unwrap_or(b'?'));
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Returns the topmost mount whose mount point is exactly `path`.
#[must_use]
pub fn find_mount<'a>(entries: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    entries.iter().rev().find(|e| e.mount_point == path)
}

/// Returns the topmost cgroup v1 mount under `root` that carries
/// `controller`.
///
/// Controllers are matched as whole tokens of the superblock options, so a
/// co-mounted `cpu,cpuacct` hierarchy counts as `cpu` and `cpuacct` but
/// never as `cpuset`.
#[must_use]
pub fn find_controller<'a>(
    entries: &'a [MountEntry],
    root: &Path,
    controller: &str,
) -> Option<&'a MountEntry> {
    entries.iter().rev().find(|e| {
        e.fs_type == "cgroup"
            && e.mount_point.starts_with(root)
            && e.super_options.split(',').any(|opt| opt == controller)
    })
}

/// Reads and parses [`MOUNTINFO_PATH`].
///
/// # Errors
///
/// Returns an error if the mount table cannot be read.
pub fn read_mountinfo() -> Result<Vec<MountEntry>> {
    let content = std::fs::read_to_string(MOUNTINFO_PATH).map_err(|e| AlchemistError::Io {
        path: MOUNTINFO_PATH.into(),
        source: e,
    })?;
    Ok(parse_mountinfo(&content))
}

/// Mounts an empty `tmpfs` at `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_tmpfs(target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| AlchemistError::Mount {
        target: target.to_path_buf(),
        message: format!("tmpfs: {e}"),
    })?;
    tracing::debug!(target = %target.display(), "tmpfs mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_tmpfs(_target: &Path) -> Result<()> {
    Err(crate::linux_required())
}

/// Mounts a cgroup v1 hierarchy carrying a single `controller` at `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails, for instance when the
/// controller is already bound to the unified v2 hierarchy.
#[cfg(target_os = "linux")]
pub fn mount_cgroup_controller(controller: &str, target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some("cgroup"),
        target,
        Some("cgroup"),
        MsFlags::empty(),
        Some(controller),
    )
    .map_err(|e| AlchemistError::Mount {
        target: target.to_path_buf(),
        message: format!("cgroup controller {controller}: {e}"),
    })?;
    tracing::debug!(controller, target = %target.display(), "cgroup controller mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_cgroup_controller(_controller: &str, _target: &Path) -> Result<()> {
    Err(crate::linux_required())
}

/// Mounts a fresh `proc` instance at `target`, creating the directory if
/// needed.
///
/// The instance reflects the PID namespace of the calling process.
///
/// # Errors
///
/// Returns an [`AlchemistError::Isolation`] error if the directory cannot
/// be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_proc(target: &Path) -> Result<()> {
    use alchemist_common::types::IsolationStep;
    use nix::mount::{MsFlags, mount};

    std::fs::create_dir_all(target).map_err(|e| AlchemistError::Isolation {
        step: IsolationStep::MountProc,
        source: e,
    })?;
    mount(
        Some("proc"),
        target,
        Some("proc"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        None::<&str>,
    )
    .map_err(|e| AlchemistError::Isolation {
        step: IsolationStep::MountProc,
        source: e.into(),
    })?;
    tracing::debug!(target = %target.display(), "proc mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc(_target: &Path) -> Result<()> {
    Err(crate::linux_required())
}

/// Lazily detaches the filesystem mounted at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> Result<()> {
    nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
        AlchemistError::Mount {
            target: target.to_path_buf(),
            message: format!("unmount failed: {e}"),
        }
    })?;
    tracing::debug!(target = %target.display(), "unmounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; unmounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn unmount(_target: &Path) -> Result<()> {
    Err(crate::linux_required())
}
