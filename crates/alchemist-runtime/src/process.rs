//! Execution of the target command inside the isolated context.
//!
//! The command inherits standard input, output and error unchanged and is
//! waited on without a timeout.

use std::process::{Command, ExitStatus, Stdio};

use alchemist_common::error::{AlchemistError, Result};

/// Runs `program` with `args` to completion and returns its exit status.
///
/// # Errors
///
/// Returns [`AlchemistError::Exec`] if the program cannot be found or
/// started, or a usage error if `program` is empty.
pub fn execute(program: &str, args: &[String]) -> Result<ExitStatus> {
    if program.is_empty() {
        return Err(AlchemistError::Usage {
            message: "no command given".into(),
        });
    }
    tracing::info!(program, ?args, "executing command");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| AlchemistError::Exec {
            program: program.to_owned(),
            source: e,
        })?;

    tracing::info!(program, %status, "command exited");
    Ok(status)
}

/// Converts an exit status into a shell-style exit code.
///
/// A process killed by a signal reports `128 + signo`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}
