//! CLI command definitions and dispatch.

pub mod child;
pub mod mkfs;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use alchemist_common::constants::{BIN_NAME, CONFIG_ENV};

/// Alchemist: run a command in an isolated, process-limited sandbox.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON file with launch defaults; flags override its values.
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command inside new UTS, PID and mount namespaces.
    Run(run::RunArgs),
    /// Internal: in-namespace stage started by `run`.
    #[command(hide = true)]
    Child(child::ChildArgs),
    /// Build a root filesystem directory from a tar archive.
    Mkfs(mkfs::MkfsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// Returns the exit code the process should terminate with.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run(args) => run::execute(args, cli.config.as_deref()),
        Command::Child(args) => child::execute(args),
        Command::Mkfs(args) => mkfs::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["alchemist", "explode"]).is_err());
    }

    #[test]
    fn run_parses_maxpid_and_command() {
        let cli = Cli::try_parse_from(["alchemist", "run", "--maxpid", "5", "/bin/echo", "hello"])
            .expect("should parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_pids, Some(5));
        assert_eq!(args.command, vec!["/bin/echo", "hello"]);
    }

    #[test]
    fn run_keeps_command_flags_for_the_command() {
        let cli = Cli::try_parse_from(["alchemist", "run", "-p", "3", "ls", "-la", "--maxpid"])
            .expect("should parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_pids, Some(3));
        assert_eq!(args.command, vec!["ls", "-la", "--maxpid"]);
    }

    #[test]
    fn run_requires_a_command() {
        assert!(Cli::try_parse_from(["alchemist", "run"]).is_err());
    }

    #[test]
    fn child_accepts_bare_command() {
        let cli = Cli::try_parse_from(["alchemist", "child", "/nonexistent/binary"])
            .expect("should parse");
        let Command::Child(args) = cli.command else {
            panic!("expected child");
        };
        assert_eq!(args.max_pids, 0);
        assert_eq!(args.command, vec!["/nonexistent/binary"]);
    }

    fn child_config(cli: Cli) -> (alchemist_common::config::LaunchConfig, Vec<String>) {
        let Command::Child(args) = cli.command else {
            panic!("expected child");
        };
        args.into_config().expect("valid child config")
    }

    #[test]
    fn child_stage_receives_the_launcher_configuration() {
        use alchemist_common::config::LaunchConfig;
        use alchemist_common::types::{CgroupName, FailurePolicy, PidLimit};

        let config = LaunchConfig {
            hostname: "box".into(),
            rootfs: Some(PathBuf::from("/tmp/alpine-minifs")),
            cgroup_root: PathBuf::from("/mnt/cgroups"),
            cgroup_name: CgroupName::new("alchemist-1234abcd").unwrap(),
            max_pids: PidLimit::new(7),
            failure_policy: FailurePolicy::Lenient,
        };
        let command: Vec<String> = ["ls", "--maxpid", "3", "-la"]
            .into_iter()
            .map(String::from)
            .collect();

        let argv = alchemist_runtime::launcher::child_args(&config, &command);
        let cli = Cli::try_parse_from(argv).expect("child stage should parse its own argv");

        assert_eq!(child_config(cli), (config, command));
    }

    #[test]
    fn child_stage_receives_default_configuration() {
        use alchemist_common::config::LaunchConfig;

        let config = LaunchConfig::default();
        let command = vec!["/bin/echo".to_owned(), "hello".to_owned()];

        let argv = alchemist_runtime::launcher::child_args(&config, &command);
        let cli = Cli::try_parse_from(argv).expect("child stage should parse its own argv");

        assert_eq!(child_config(cli), (config, command));
    }
}
