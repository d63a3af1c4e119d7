//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::IsolationStep;

/// Sets the hostname inside the UTS namespace.
///
/// Only visible to the calling namespace; the host's hostname is unaffected.
///
/// # Errors
///
/// Returns an [`AlchemistError::Isolation`] error if `sethostname(2)` fails.
#[cfg(target_os = "linux")]
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| AlchemistError::Isolation {
        step: IsolationStep::Hostname,
        source: e.into(),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; UTS namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_hostname(_hostname: &str) -> Result<()> {
    Err(crate::linux_required())
}
