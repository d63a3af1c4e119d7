//! # alchemist-core
//!
//! Low-level Linux isolation primitives for the Alchemist launcher.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: UTS, PID and mount namespace selection and hostname.
//! - **Cgroups v1**: the `pids` controller used to cap live process count.
//! - **Filesystem**: `chroot`, `/proc` mounting and mount-table inspection.
//! - **Isolation**: the fixed hostname → chroot → chdir → proc sequence.
//!
//! Every OS call reports failure through
//! [`AlchemistError`](alchemist_common::error::AlchemistError); no function
//! here decides on its own that an error can be ignored.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod isolation;
pub mod namespace;

/// Error returned by the stubs compiled on non-Linux hosts.
#[cfg(not(target_os = "linux"))]
pub(crate) fn linux_required() -> alchemist_common::error::AlchemistError {
    alchemist_common::error::AlchemistError::Config {
        message: "Linux required for native container operations".into(),
    }
}
