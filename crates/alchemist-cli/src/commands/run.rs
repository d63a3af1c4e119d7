//! `alchemist run`: run a command in a new container.

use std::path::{Path, PathBuf};

use clap::Args;

use alchemist_common::config::LaunchConfig;
use alchemist_common::types::{CgroupName, FailurePolicy, PidLimit};
use alchemist_runtime::launcher::Launcher;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Maximum number of processes inside the container (0 = default of 20).
    #[arg(short = 'p', long = "maxpid", value_name = "N")]
    pub max_pids: Option<u32>,

    /// Hostname inside the container.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Directory to use as the container's root filesystem.
    #[arg(long, value_name = "DIR")]
    pub rootfs: Option<PathBuf>,

    /// Name of the pids cgroup (default: generated per run).
    #[arg(long, value_name = "NAME")]
    pub cgroup_name: Option<String>,

    /// Run without the process limit when cgroups cannot be set up.
    #[arg(long)]
    pub lenient: bool,

    /// Command to run, followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

/// Executes the `run` command and returns the container's exit code.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the container
/// cannot be launched.
pub fn execute(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    tracing::debug!(
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        cwd = ?std::env::current_dir().ok(),
        "host context"
    );

    let config = resolve_config(&args, config_path)?;
    let code = Launcher::new().launch(&config, &args.command)?;
    Ok(code)
}

/// Layers command-line flags over the file configuration (or defaults).
fn resolve_config(args: &RunArgs, config_path: Option<&Path>) -> anyhow::Result<LaunchConfig> {
    let mut config = match config_path {
        Some(path) => LaunchConfig::from_file(path)?,
        None => LaunchConfig::default(),
    };
    if let Some(max) = args.max_pids {
        config.max_pids = PidLimit::new(max);
    }
    if let Some(hostname) = &args.hostname {
        config.hostname.clone_from(hostname);
    }
    if let Some(rootfs) = &args.rootfs {
        config.rootfs = Some(rootfs.clone());
    }
    if let Some(name) = &args.cgroup_name {
        config.cgroup_name = CgroupName::new(name.as_str())?;
    }
    if args.lenient {
        config.failure_policy = FailurePolicy::Lenient;
    }
    Ok(config)
}
