//! # alchemist: process-isolation launcher
//!
//! Runs a command inside fresh UTS, PID and mount namespaces with a
//! process-count limit, its own hostname and an optional private root.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use alchemist_common::constants::{BIN_NAME, EXIT_USAGE};
use alchemist_common::error::AlchemistError;

use crate::commands::Cli;

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return to_exit_code(code);
        }
    };

    match commands::execute(cli) {
        Ok(code) => to_exit_code(code),
        Err(e) => {
            eprintln!("{BIN_NAME}: {e}");
            let code = e.downcast_ref::<AlchemistError>().map_or(1, AlchemistError::exit_code);
            to_exit_code(code)
        }
    }
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
