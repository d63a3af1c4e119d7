//! Domain primitive types used across the Alchemist workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{CGROUP_NAME_PREFIX, DEFAULT_MAX_PIDS};

/// Name of the per-invocation cgroup.
///
/// Generated names carry a random suffix so concurrent launches never
/// share accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct CgroupName(String);

impl CgroupName {
    /// Creates a cgroup name from a string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains a path separator,
    /// or is a relative path component.
    pub fn new(name: impl Into<String>) -> crate::error::Result<Self> {
        let name = name.into();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(crate::error::AlchemistError::Config {
                message: format!("invalid cgroup name: {name:?}"),
            });
        }
        Ok(Self(name))
    }

    /// Generates a unique name of the form `alchemist-<8 hex digits>`.
    #[must_use]
    pub fn generate() -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{CGROUP_NAME_PREFIX}-{}", &token[..8]))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CgroupName {
    type Error = crate::error::AlchemistError;

    fn try_from(name: String) -> crate::error::Result<Self> {
        Self::new(name)
    }
}

impl fmt::Display for CgroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of live processes allowed in the cgroup.
///
/// Zero is not a usable ceiling and stands for "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct PidLimit(u32);

impl PidLimit {
    /// Creates a limit, substituting [`DEFAULT_MAX_PIDS`] for zero.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        if max == 0 {
            Self(DEFAULT_MAX_PIDS)
        } else {
            Self(max)
        }
    }

    /// Returns the effective ceiling.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for PidLimit {
    fn default() -> Self {
        Self(DEFAULT_MAX_PIDS)
    }
}

impl From<u32> for PidLimit {
    fn from(max: u32) -> Self {
        Self::new(max)
    }
}

impl From<PidLimit> for u32 {
    fn from(limit: PidLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for PidLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA-256 hash digest used for content verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a hash from a hex-encoded string, normalised to lowercase.
    ///
    /// An optional `sha256:` prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> crate::error::Result<Self> {
        let hex = hex.into();
        let digits = hex.strip_prefix("sha256:").unwrap_or(&hex);
        if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::error::AlchemistError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(digits.to_ascii_lowercase()))
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// What the child stage does when resource limiting cannot be applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the launch before the target command starts.
    #[default]
    Strict,
    /// Log a warning and run the command without the limit.
    Lenient,
}

impl FailurePolicy {
    /// Parses the lowercase name used on the internal command line.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than `strict` or `lenient`.
    pub fn parse(value: &str) -> crate::error::Result<Self> {
        match value {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(crate::error::AlchemistError::Usage {
                message: format!("unknown failure policy {other:?}"),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

/// One step of container isolation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationStep {
    /// `sethostname(2)` inside the UTS namespace.
    Hostname,
    /// `chroot(2)` into the container root.
    Chroot,
    /// `chdir("/")` inside the new root.
    Chdir,
    /// Mount of a fresh `proc` instance.
    MountProc,
}

impl fmt::Display for IsolationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hostname => write!(f, "hostname"),
            Self::Chroot => write!(f, "chroot"),
            Self::Chdir => write!(f, "chdir"),
            Self::MountProc => write!(f, "mount proc"),
        }
    }
}

/// Lifecycle phase of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchPhase {
    /// The command line has been parsed.
    Parsed,
    /// The namespaced child has been requested from the kernel.
    NamespacesRequested,
    /// The child stage is applying limits, isolating, or executing.
    ChildRunning,
    /// The child has exited.
    Terminated,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::NamespacesRequested => write!(f, "namespaces-requested"),
            Self::ChildRunning => write!(f, "child-running"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pid_limit_uses_default() {
        assert_eq!(PidLimit::new(0).get(), 20);
        assert_eq!(PidLimit::default().get(), DEFAULT_MAX_PIDS);
    }

    #[test]
    fn nonzero_pid_limit_is_kept() {
        assert_eq!(PidLimit::new(5).get(), 5);
        assert_eq!(PidLimit::from(1).to_string(), "1");
    }

    #[test]
    fn pid_limit_deserializes_zero_as_default() {
        let limit: PidLimit = serde_json::from_str("0").unwrap();
        assert_eq!(limit.get(), 20);
    }

    #[test]
    fn generated_cgroup_names_are_unique_and_prefixed() {
        let a = CgroupName::generate();
        let b = CgroupName::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("alchemist-"));
        assert_eq!(a.as_str().len(), "alchemist-".len() + 8);
    }

    #[test]
    fn cgroup_name_rejects_path_components() {
        assert!(CgroupName::new("").is_err());
        assert!(CgroupName::new("..").is_err());
        assert!(CgroupName::new("a/b").is_err());
        assert!(CgroupName::new("alchemist").is_ok());
    }

    #[test]
    fn sha256_accepts_prefixed_uppercase_hex() {
        let hex = "AB".repeat(32);
        let hash = Sha256Hash::from_hex(format!("sha256:{hex}")).unwrap();
        assert_eq!(hash.as_hex(), "ab".repeat(32));
        assert!(Sha256Hash::from_hex("abc").is_err());
        assert!(Sha256Hash::from_hex("z".repeat(64)).is_err());
    }

    #[test]
    fn failure_policy_round_trips_through_display() {
        for policy in [FailurePolicy::Strict, FailurePolicy::Lenient] {
            assert_eq!(FailurePolicy::parse(&policy.to_string()).unwrap(), policy);
        }
        assert!(FailurePolicy::parse("sometimes").is_err());
    }
}
