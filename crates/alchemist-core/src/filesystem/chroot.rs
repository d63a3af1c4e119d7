//! Root filesystem switching via `chroot(2)`.
//!
//! Confines path resolution of the calling process and its descendants to
//! a subtree. Must be followed by [`enter_root`] so the working directory
//! does not point outside the new root.

use std::path::Path;

use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::IsolationStep;

/// Changes the root filesystem of the calling process to `new_root`.
///
/// # Errors
///
/// Returns an [`AlchemistError::Isolation`] error if `chroot(2)` fails.
#[cfg(target_os = "linux")]
pub fn change_root(new_root: &Path) -> Result<()> {
    nix::unistd::chroot(new_root).map_err(|e| AlchemistError::Isolation {
        step: IsolationStep::Chroot,
        source: e.into(),
    })?;
    tracing::info!(new_root = %new_root.display(), "changed root");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; chroot isolation requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn change_root(_new_root: &Path) -> Result<()> {
    Err(crate::linux_required())
}

/// Resets the working directory to `/` of the current root.
///
/// # Errors
///
/// Returns an [`AlchemistError::Isolation`] error if `chdir(2)` fails.
pub fn enter_root() -> Result<()> {
    std::env::set_current_dir("/").map_err(|e| AlchemistError::Isolation {
        step: IsolationStep::Chdir,
        source: e,
    })?;
    tracing::debug!("working directory reset to /");
    Ok(())
}
