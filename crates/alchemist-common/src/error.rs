//! Unified error types for the Alchemist workspace.
//!
//! Every OS interaction reports through [`AlchemistError`]; callers decide
//! whether a failure is fatal. Each variant maps to its own process exit
//! code so scripts can tell failure kinds apart.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::IsolationStep;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum AlchemistError {
    /// The command line could not be understood.
    #[error("usage error: {message}")]
    Usage {
        /// Description of the usage problem.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Mounting or inspecting a filesystem failed.
    #[error("mount of {target} failed: {message}")]
    Mount {
        /// Mount point involved.
        target: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Writing a cgroup control file failed.
    #[error("cgroup write to {path} failed: {source}")]
    CgroupWrite {
        /// Control file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// One of the isolation steps failed.
    #[error("isolation step `{step}` failed: {source}")]
    Isolation {
        /// Step that failed.
        step: IsolationStep,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The target program could not be started.
    #[error("cannot execute {program}: {source}")]
    Exec {
        /// Program that was requested.
        program: String,
        /// Underlying spawn error.
        source: std::io::Error,
    },

    /// The namespaced child process could not be created or awaited.
    #[error("launch failed: {message}")]
    Launch {
        /// Description of the failure.
        message: String,
    },

    /// A hash validation failed.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected hash value.
        expected: String,
        /// Actual computed hash value.
        actual: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl AlchemistError {
    /// Returns the process exit code reported for this error.
    ///
    /// Codes follow `sysexits.h` where a matching entry exists; exec
    /// failures use the shell conventions 127 (not found) and 126.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } => crate::constants::EXIT_USAGE,
            Self::HashMismatch { .. } => 65,
            Self::Launch { .. } => 70,
            Self::Mount { .. } => 71,
            Self::CgroupWrite { .. } => 72,
            Self::Io { .. } => 74,
            Self::Isolation { .. } => 77,
            Self::Config { .. } | Self::Serialization { .. } => 78,
            Self::Exec { source, .. } if source.kind() == std::io::ErrorKind::NotFound => 127,
            Self::Exec { .. } => 126,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, AlchemistError>;
