//! Filesystem management for container isolation.
//!
//! Provides `chroot` root switching, `/proc` and cgroup mounts, and
//! mount-table inspection through `/proc/self/mountinfo`.

pub mod chroot;
pub mod mount;
