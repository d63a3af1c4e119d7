//! `alchemist child`: the in-namespace stage.
//!
//! Started by `run` through `/proc/self/exe`; not meant to be typed by
//! hand. Every setting arrives as an explicit flag so this stage never
//! re-reads the configuration file.

use std::path::PathBuf;

use clap::Args;

use alchemist_common::config::LaunchConfig;
use alchemist_common::constants::{CGROUP_ROOT, DEFAULT_HOSTNAME};
use alchemist_common::types::{CgroupName, FailurePolicy, PidLimit};

/// Arguments for the hidden `child` command.
#[derive(Args, Debug)]
pub struct ChildArgs {
    /// Process-count ceiling (0 = default).
    #[arg(long = "maxpid", default_value_t = 0)]
    pub max_pids: u32,

    /// Hostname to set.
    #[arg(long, default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// Mount point of the cgroup hierarchy.
    #[arg(long, default_value = CGROUP_ROOT)]
    pub cgroup_root: PathBuf,

    /// Cgroup to join (generated when absent).
    #[arg(long)]
    pub cgroup_name: Option<String>,

    /// Directory to chroot into.
    #[arg(long)]
    pub rootfs: Option<PathBuf>,

    /// Behaviour when the process limit cannot be applied.
    #[arg(long, value_parser = FailurePolicy::parse, default_value = "strict")]
    pub policy: FailurePolicy,

    /// Command to execute, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ChildArgs {
    /// Rebuilds the launcher's configuration and splits off the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup name or hostname is invalid.
    pub fn into_config(self) -> alchemist_common::error::Result<(LaunchConfig, Vec<String>)> {
        let cgroup_name = match self.cgroup_name {
            Some(name) => CgroupName::new(name)?,
            None => CgroupName::generate(),
        };
        let config = LaunchConfig {
            hostname: self.hostname,
            rootfs: self.rootfs,
            cgroup_root: self.cgroup_root,
            cgroup_name,
            max_pids: PidLimit::new(self.max_pids),
            failure_policy: self.policy,
        };
        config.validate()?;
        Ok((config, self.command))
    }
}

/// Executes the child stage and returns the command's exit code.
///
/// # Errors
///
/// Returns an error if isolation, cgroup setup under the strict policy, or
/// exec fails.
pub fn execute(args: ChildArgs) -> anyhow::Result<i32> {
    let (config, command) = args.into_config()?;
    let code = alchemist_runtime::child::run(&config, &command)?;
    Ok(code)
}
