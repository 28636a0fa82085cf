//! Corruption log: paths that failed verification on the last download.
//!
//! Plain text, one relative path per line, at
//! `<local-dir>/s3-meta-sync-corrupted.log`. Written by a failed download,
//! consumed (read, then deleted) by the next upload from the same directory.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use metasync_core::CORRUPT_LOG;

use crate::error::{io_err, SyncError};

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(CORRUPT_LOG)
}

/// Read and delete the log. Missing log → empty set.
pub fn take(dir: &Path) -> Result<BTreeSet<String>, SyncError> {
    let path = log_path(dir);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => return Err(io_err(&path, err)),
    };
    std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;

    let paths: BTreeSet<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if !paths.is_empty() {
        tracing::info!(
            "forcing re-upload of {} path(s) from {}",
            paths.len(),
            path.display()
        );
    }
    Ok(paths)
}

/// Overwrite the log with `paths`, creating `dir` if needed.
pub fn record(dir: &Path, paths: &[String]) -> Result<(), SyncError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let path = log_path(dir);
    let mut contents = paths.join("\n");
    contents.push('\n');
    std::fs::write(&path, contents).map_err(|e| io_err(&path, e))?;
    tracing::warn!("recorded {} corrupted path(s) in {}", paths.len(), path.display());
    Ok(())
}
