//! Container creation pipeline for the Alchemist launcher.
//!
//! - [`launcher`]: the `run` stage, which re-executes the binary inside
//!   fresh UTS, PID and mount namespaces and waits for it.
//! - [`child`]: the in-namespace stage, which limits process count,
//!   isolates the process and runs the target command.
//! - [`process`]: spawning the target command with inherited streams.
//! - [`rootfs`]: materialising a root filesystem for `chroot` (`mkfs`).

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod child;
pub mod hash;
pub mod launcher;
pub mod process;
pub mod rootfs;
