//! Directory swap: replace the live destination with a staged tree.
//!
//! 1. Remove leftover `<dest>-next` / `<dest>-delete` from a crashed swap.
//! 2. Move the staging dir to `<dest>-next`.
//! 3. Copy the destination's permission bits onto `<dest>-next`.
//! 4. Rename `<dest>` → `<dest>-delete`, then `<dest>-next` → `<dest>`.
//! 5. Remove `<dest>-delete`.
//!
//! Each rename in step 4 is atomic but the pair is not: between them
//! `<dest>` does not exist. Readers that race the swap can observe that.

use std::ffi::OsString;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

pub fn swap(destination: &Path, staging: &Path) -> Result<(), SyncError> {
    let next = sibling(destination, "-next");
    let delete = sibling(destination, "-delete");

    remove_if_exists(&next)?;
    remove_if_exists(&delete)?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    move_dir(staging, &next)?;

    match fs::metadata(destination) {
        Ok(meta) => {
            fs::set_permissions(&next, meta.permissions()).map_err(|e| io_err(&next, e))?;
            fs::rename(destination, &delete).map_err(|e| io_err(destination, e))?;
            fs::rename(&next, destination).map_err(|e| io_err(&next, e))?;
            remove_if_exists(&delete)?;
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::rename(&next, destination).map_err(|e| io_err(&next, e))?;
        }
        Err(err) => return Err(io_err(destination, err)),
    }

    tracing::debug!("swapped {} into {}", staging.display(), destination.display());
    Ok(())
}

/// `path` with `suffix` appended to its last component.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let trimmed: PathBuf = path.components().collect();
    let mut name = OsString::from(trimmed.into_os_string());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<(), SyncError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };
    result.map_err(|e| io_err(path, e))
}

/// Rename `from` to `to`, copying instead when they sit on different
/// filesystems.
pub(crate) fn move_dir(from: &Path, to: &Path) -> Result<(), SyncError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            tracing::debug!(
                "{} and {} are on different filesystems; copying",
                from.display(),
                to.display()
            );
            copy_tree(from, to).map_err(|e| io_err(to, e))?;
            fs::remove_dir_all(from).map_err(|e| io_err(from, e))
        }
        Err(err) => Err(io_err(to, err)),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    const EXDEV: i32 = 18;
    #[cfg(windows)]
    const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE
    #[cfg(not(any(unix, windows)))]
    const EXDEV: i32 = -1;

    err.raw_os_error() == Some(EXDEV)
}

/// Recursively copy `from` into `to`: directories and regular files.
/// Symlinks to files are copied as the files they resolve to; other
/// symlinks are skipped, so nothing in `to` points back into a live tree.
/// Permission bits travel with `fs::copy`.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            // Dangling links and links to directories have no file body.
            if fs::metadata(entry.path()).is_ok_and(|meta| meta.is_file()) {
                fs::copy(entry.path(), &target)?;
            }
        }
    }
    Ok(())
}
