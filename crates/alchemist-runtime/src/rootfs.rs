//! Root filesystem materialisation for `chroot` use (`mkfs`).
//!
//! Unpacks a minimal root filesystem archive (plain or gzip-compressed
//! tar, e.g. an Alpine minirootfs) into a directory and adds the mount
//! points the child stage expects.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use alchemist_common::error::{AlchemistError, Result};
use alchemist_common::types::Sha256Hash;

/// Directories every root filesystem gets, whether or not the archive has
/// them.
pub const SKELETON_DIRS: [&str; 4] = ["proc", "sys", "dev", "tmp"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Parameters of a `mkfs` run.
#[derive(Debug, Clone)]
pub struct MkfsOptions {
    /// Tar archive to unpack.
    pub archive: PathBuf,
    /// Directory to unpack into.
    pub target: PathBuf,
    /// Expected digest of the archive, checked before unpacking.
    pub sha256: Option<Sha256Hash>,
    /// Unpack into a non-empty target.
    pub force: bool,
}

/// Summary of a materialised root filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootfsReport {
    /// Directory holding the root filesystem.
    pub target: PathBuf,
    /// Number of archive entries unpacked.
    pub entries: u64,
    /// Total size of unpacked file contents in bytes.
    pub bytes: u64,
    /// Whether `bin/sh` exists in the result.
    pub has_shell: bool,
}

/// Builds a root filesystem from an archive.
///
/// # Errors
///
/// Returns an error if the digest does not match, the target is not empty
/// and `force` is unset, or the archive cannot be read or unpacked.
pub fn make_rootfs(options: &MkfsOptions) -> Result<RootfsReport> {
    tracing::info!(
        archive = %options.archive.display(),
        target = %options.target.display(),
        "building root filesystem"
    );

    if let Some(expected) = &options.sha256 {
        crate::hash::validate_hash(&options.archive, expected)?;
    }
    prepare_target(&options.target, options.force)?;

    let (entries, bytes) = unpack(&options.archive, &options.target)?;
    for dir in SKELETON_DIRS {
        let path = options.target.join(dir);
        std::fs::create_dir_all(&path).map_err(|e| AlchemistError::Io { path, source: e })?;
    }

    let has_shell = options.target.join("bin/sh").symlink_metadata().is_ok();
    if !has_shell {
        tracing::warn!(target = %options.target.display(), "root filesystem has no bin/sh");
    }
    tracing::info!(entries, bytes, "root filesystem ready");

    Ok(RootfsReport {
        target: options.target.clone(),
        entries,
        bytes,
        has_shell,
    })
}

fn prepare_target(target: &Path, force: bool) -> Result<()> {
    let io_err = |e| AlchemistError::Io {
        path: target.to_path_buf(),
        source: e,
    };
    std::fs::create_dir_all(target).map_err(io_err)?;
    let occupied = std::fs::read_dir(target).map_err(io_err)?.next().is_some();
    if occupied && !force {
        return Err(AlchemistError::Config {
            message: format!(
                "target {} is not empty (use --force to unpack over it)",
                target.display()
            ),
        });
    }
    Ok(())
}

/// Unpacks every entry, returning the entry count and content size.
fn unpack(archive_path: &Path, target: &Path) -> Result<(u64, u64)> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| AlchemistError::Io { path, source: e }
    };

    let mut file = File::open(archive_path).map_err(io_err(archive_path))?;
    let gzip = is_gzip(&mut file).map_err(io_err(archive_path))?;
    let reader: Box<dyn Read> = if gzip {
        Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut entries = 0;
    let mut bytes = 0;
    for entry in archive.entries().map_err(io_err(archive_path))? {
        let mut entry = entry.map_err(io_err(archive_path))?;
        let size = entry.size();
        // unpack_in refuses entries that would land outside `target`.
        let unpacked = entry.unpack_in(target).map_err(io_err(target))?;
        if unpacked {
            entries += 1;
            bytes += size;
        } else {
            tracing::warn!(path = ?entry.path().ok(), "skipped archive entry outside target");
        }
    }
    Ok((entries, bytes))
}

/// Sniffs the gzip magic bytes and rewinds.
fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let gzip = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    let _ = file.seek(SeekFrom::Start(0))?;
    Ok(gzip)
}
