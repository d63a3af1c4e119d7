//! Mount namespace isolation.
//!
//! A freshly cloned mount namespace still shares propagation with the
//! host. Making `/` recursively private keeps the container's mounts out
//! of the host mount table.

use alchemist_common::error::{AlchemistError, Result};

/// Marks every mount of the calling mount namespace as private.
///
/// # Errors
///
/// Returns an error if the `mount(2)` remount syscall fails.
#[cfg(target_os = "linux")]
pub fn make_mounts_private() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| AlchemistError::Mount {
        target: "/".into(),
        message: format!("making mounts private failed: {e}"),
    })?;
    tracing::debug!("mount propagation set to private");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mount namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn make_mounts_private() -> Result<()> {
    Err(crate::linux_required())
}
