//! Linux namespace management for container isolation.
//!
//! The launcher creates every namespace at once when it clones the child
//! process; nothing downstream unshares further.

pub mod mount;
pub mod uts;

/// Which namespaces the child process is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSet {
    /// Isolate the hostname.
    pub uts: bool,
    /// Isolate the process ID space; the child becomes PID 1.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
        }
    }
}

#[cfg(target_os = "linux")]
impl NamespaceSet {
    /// Returns the `clone(2)` flags requesting these namespaces.
    #[must_use]
    pub fn clone_flags(&self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        let mut flags = CloneFlags::empty();
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        flags
    }
}
