//! `alchemist mkfs`: build a root filesystem directory from an archive.

use std::path::PathBuf;

use clap::Args;

use alchemist_common::constants::DEFAULT_ROOTFS_DIR;
use alchemist_common::types::Sha256Hash;
use alchemist_runtime::rootfs::{MkfsOptions, RootfsReport, make_rootfs};

use crate::output::format_bytes;

/// Arguments for the `mkfs` command.
#[derive(Args, Debug)]
pub struct MkfsArgs {
    /// Tar archive (optionally gzip-compressed) holding the root filesystem.
    #[arg(long, value_name = "FILE")]
    pub archive: PathBuf,

    /// Directory to unpack into.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_ROOTFS_DIR)]
    pub target: PathBuf,

    /// Expected SHA-256 of the archive.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Unpack even if the target directory is not empty.
    #[arg(long)]
    pub force: bool,
}

/// Executes the `mkfs` command.
///
/// # Errors
///
/// Returns an error if the digest is malformed or does not match, or the
/// archive cannot be unpacked.
pub fn execute(args: MkfsArgs) -> anyhow::Result<i32> {
    let sha256 = args.sha256.map(Sha256Hash::from_hex).transpose()?;
    let report = make_rootfs(&MkfsOptions {
        archive: args.archive,
        target: args.target,
        sha256,
        force: args.force,
    })?;
    print_report(&report);
    Ok(0)
}

#[allow(clippy::print_stderr)]
fn print_report(report: &RootfsReport) {
    eprintln!(
        "Root filesystem ready at {}: {} entries, {}",
        report.target.display(),
        report.entries,
        format_bytes(report.bytes)
    );
    if !report.has_shell {
        eprintln!("warning: no bin/sh in {}", report.target.display());
    }
}
