//! MD5 content fingerprints for files and trees.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::Path;

use md5::{Digest, Md5};
use walkdir::WalkDir;

use crate::error::{io_err, ManifestError};
use crate::manifest::{CORRUPT_LOG, META_FILE};
use crate::types::{FileMap, Fingerprint};

/// Fingerprint raw bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Md5::digest(bytes)))
}

/// Stream a file through MD5.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, ManifestError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint files under `root`.
///
/// With `paths`, exactly those relative paths are hashed. Without, every
/// regular file under `root` is enumerated (symlinks count only if they
/// resolve to a regular file); the manifest and the corruption log are
/// skipped. A missing `root` yields an empty map.
pub fn fingerprint_tree(root: &Path, paths: Option<&[String]>) -> Result<FileMap, ManifestError> {
    let mut files = FileMap::new();

    if let Some(paths) = paths {
        for rel in paths {
            files.insert(rel.clone(), fingerprint_file(&root.join(rel))?);
        }
        return Ok(files);
    }

    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(files),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(io_err(root, err)),
    }

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;

        let is_file = if entry.file_type().is_symlink() {
            // Dangling links and links to directories are not content.
            std::fs::metadata(entry.path())
                .map(|m| m.is_file())
                .unwrap_or(false)
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            continue;
        }

        let Some(rel) = relative_key(root, entry.path()) else {
            continue;
        };
        if rel == META_FILE || rel == CORRUPT_LOG {
            continue;
        }
        files.insert(rel, fingerprint_file(entry.path())?);
    }

    Ok(files)
}

/// `root`-relative key with `/` separators, or `None` for non-UTF-8 names.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
