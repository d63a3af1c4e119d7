//! SHA-256 content verification for root filesystem archives.

use std::io::Read;
use std::path::Path;

use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::Sha256Hash;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Sha256Hash> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let io_err = |e| AlchemistError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Sha256Hash::from_hex(hex)
}

/// Validates that a file matches the expected SHA-256 hash.
///
/// # Errors
///
/// Returns `AlchemistError::HashMismatch` if the hashes do not match.
pub fn validate_hash(path: &Path, expected: &Sha256Hash) -> Result<()> {
    let actual = hash_file(path)?;
    if &actual != expected {
        return Err(AlchemistError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    tracing::debug!(path = %path.display(), hash = %actual, "hash verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello")
    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hash_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(hash_file(&path).unwrap().as_hex(), HELLO);
    }

    #[test]
    fn validate_hash_accepts_matching_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        let expected = Sha256Hash::from_hex(HELLO).unwrap();
        assert!(validate_hash(&path, &expected).is_ok());
    }

    #[test]
    fn validate_hash_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.txt");
        std::fs::write(&path, "goodbye").unwrap();
        let expected = Sha256Hash::from_hex(HELLO).unwrap();
        assert!(matches!(
            validate_hash(&path, &expected),
            Err(AlchemistError::HashMismatch { .. })
        ));
    }
}
