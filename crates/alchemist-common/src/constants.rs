//! System-wide constants and default paths.

/// Cgroup hierarchy mount point (a tmpfs holding the v1 controller mounts).
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Directory name of the `pids` controller under [`CGROUP_ROOT`].
pub const PIDS_CONTROLLER: &str = "pids";

/// Directory name of the `cpu` controller under [`CGROUP_ROOT`].
pub const CPU_CONTROLLER: &str = "cpu";

/// Prefix shared by every cgroup created by the launcher.
pub const CGROUP_NAME_PREFIX: &str = "alchemist";

/// Process-count ceiling applied when none (or zero) is requested.
pub const DEFAULT_MAX_PIDS: u32 = 20;

/// Hostname set inside the UTS namespace unless configured otherwise.
pub const DEFAULT_HOSTNAME: &str = "container";

/// Directory `mkfs` materialises a root filesystem into by default.
pub const DEFAULT_ROOTFS_DIR: &str = "/tmp/alpine-minifs";

/// Path the launcher re-executes to enter the child stage.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Marker argument selecting the in-namespace child stage.
pub const CHILD_STAGE_ARG: &str = "child";

/// Mount target of the container's `/proc`, relative to its root.
pub const PROC_TARGET: &str = "proc";

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "ALCHEMIST_CONFIG";

/// Exit code for command-line usage errors (`EX_USAGE`).
pub const EXIT_USAGE: i32 = 64;

/// Binary name for the CLI.
pub const BIN_NAME: &str = "alchemist";
