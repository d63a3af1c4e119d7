//! Launch configuration model.
//!
//! A [`LaunchConfig`] is resolved once in the launcher (defaults, then an
//! optional JSON file, then command-line flags) and handed to the child
//! stage through explicit arguments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AlchemistError, Result};
use crate::types::{CgroupName, FailurePolicy, PidLimit};

/// Everything the child stage needs to build the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchConfig {
    /// Hostname set inside the UTS namespace.
    pub hostname: String,
    /// Directory to chroot into; `None` keeps the host filesystem view.
    pub rootfs: Option<PathBuf>,
    /// Mount point of the cgroup hierarchy.
    pub cgroup_root: PathBuf,
    /// Name of the cgroup created under the `pids` controller.
    pub cgroup_name: CgroupName,
    /// Process-count ceiling for the cgroup.
    pub max_pids: PidLimit,
    /// Whether resource-limit failures abort the launch.
    pub failure_policy: FailurePolicy,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            hostname: crate::constants::DEFAULT_HOSTNAME.to_owned(),
            rootfs: None,
            cgroup_root: PathBuf::from(crate::constants::CGROUP_ROOT),
            cgroup_name: CgroupName::generate(),
            max_pids: PidLimit::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl LaunchConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Fields absent from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON
    /// for this schema.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AlchemistError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded launch configuration");
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname is empty or longer than the
    /// kernel's 64-byte limit.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() || self.hostname.len() > 64 {
            return Err(AlchemistError::Config {
                message: format!("hostname must be 1-64 bytes, got {:?}", self.hostname),
            });
        }
        Ok(())
    }
}
