//! Download staging.
//!
//! A download never writes into the live destination. The next state of the
//! tree is assembled in a fresh directory under the staging root (seeded
//! with the current destination), the freshly downloaded files are checked
//! against the remote manifest, and only then is the staged tree swapped
//! into place.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use metasync_core::digest::fingerprint_file;
use metasync_core::manifest::write_local;
use metasync_core::{Manifest, SyncOptions, SyncPlan};
use metasync_transport::Remote;
use tempfile::TempDir;

use crate::corruption;
use crate::error::{io_err, SyncError};
use crate::pool::run_parallel;
use crate::swap::{copy_tree, swap};

/// Name prefix of every staging directory.
pub const STAGING_PREFIX: &str = "s3-meta-sync-";

/// Staging directories older than this are leftovers from a killed run.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Stale cleanup
// ---------------------------------------------------------------------------

/// Remove staging directories under `root` whose change time is more than
/// [`STALE_AFTER`] before `now`. Best-effort: failures are logged and
/// skipped. Returns the directories removed.
pub fn purge_stale(root: &Path, now: SystemTime) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_dir() {
            continue;
        }
        let Some(changed) = changed_at(&meta) else { continue };
        let stale = now
            .duration_since(changed)
            .map(|age| age > STALE_AFTER)
            .unwrap_or(false);
        if !stale {
            continue;
        }

        let path = entry.path();
        match fs::remove_dir_all(&path) {
            Ok(()) => removed.push(path),
            Err(err) => tracing::warn!("could not remove stale {}: {err}", path.display()),
        }
    }

    if !removed.is_empty() {
        tracing::info!(
            "removed {} stale staging dir(s) under {}",
            removed.len(),
            root.display()
        );
    }
    removed
}

#[cfg(unix)]
fn changed_at(meta: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;

    let secs = u64::try_from(meta.ctime()).ok()?;
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(not(unix))]
fn changed_at(meta: &fs::Metadata) -> Option<SystemTime> {
    meta.modified().ok()
}

// ---------------------------------------------------------------------------
// Path safety
// ---------------------------------------------------------------------------

/// Reject manifest paths that are empty, absolute, or climb out of the tree.
pub fn check_path(rel: &str) -> Result<(), SyncError> {
    let path = Path::new(rel);
    let safe = !rel.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(SyncError::UnsafePath {
            path: rel.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Staging directory
// ---------------------------------------------------------------------------

/// One staging directory. Removed on drop unless it was swapped into place.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Create a fresh, empty staging directory under `root`.
    pub fn create(root: &Path) -> Result<Self, SyncError> {
        fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| io_err(root, e))?;
        tracing::debug!("staging in {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy the current destination into the staging dir so unchanged files
    /// need no transfer. A failed copy only costs extra downloads.
    pub fn seed_from(&self, destination: &Path) {
        if !destination.is_dir() {
            return;
        }
        if let Err(err) = copy_tree(destination, self.path()) {
            tracing::warn!(
                "could not seed staging from {}: {err}",
                destination.display()
            );
        }
    }

    /// Download `plan.to_transfer`, delete `plan.to_delete`, prune emptied
    /// directories and write `manifest` into the staging dir.
    pub fn apply(
        &self,
        remote: &Remote,
        manifest: &Manifest,
        plan: &SyncPlan,
        parallel: usize,
    ) -> Result<(), SyncError> {
        let root = self.path();

        for rel in &plan.to_transfer {
            check_path(rel)?;
            clear_way(root, rel)?;
        }

        let compressed = manifest.compressed;
        run_parallel(
            plan.to_transfer.iter().cloned().collect(),
            parallel,
            |rel: String| {
                let body = remote.download(&rel, compressed)?;
                let target = root.join(&rel);
                fs::write(&target, &body).map_err(|e| io_err(&target, e))?;
                tracing::debug!("downloaded {} ({} bytes)", remote.location(&rel), body.len());
                Ok(())
            },
        )?;

        for rel in &plan.to_delete {
            check_path(rel)?;
            let target = root.join(rel);
            match fs::symlink_metadata(&target) {
                // Became a directory for a downloaded path.
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    fs::remove_file(&target).map_err(|e| io_err(&target, e))?;
                    tracing::debug!("deleted {rel}");
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_err(&target, err)),
            }
            prune_empty_parents(root, &target);
        }

        write_local(root, manifest)?;
        Ok(())
    }

    /// Fingerprint exactly `downloaded` and return the paths that do not
    /// match `manifest`, sorted.
    pub fn verify(
        &self,
        manifest: &Manifest,
        downloaded: &BTreeSet<String>,
    ) -> Result<Vec<String>, SyncError> {
        let mut mismatched = Vec::new();
        for rel in downloaded {
            let actual = match fingerprint_file(&self.path().join(rel)) {
                Ok(fingerprint) => Some(fingerprint),
                Err(metasync_core::ManifestError::Io { source, .. })
                    if source.kind() == ErrorKind::NotFound =>
                {
                    None
                }
                Err(err) => return Err(err.into()),
            };
            if actual.as_ref() != manifest.files.get(rel) {
                tracing::warn!("{rel} does not match the remote manifest");
                mismatched.push(rel.clone());
            }
        }
        Ok(mismatched)
    }
}

/// Make `root/rel` writable as a fresh file: create its parent directories,
/// replacing any file or symlink in the way, and remove whatever sits at the
/// target itself so the write cannot follow a link out of `root`.
fn clear_way(root: &Path, rel: &str) -> Result<(), SyncError> {
    let target = root.join(rel);

    let mut ancestor = root.to_path_buf();
    if let Some(parent) = Path::new(rel).parent() {
        for component in parent.components() {
            ancestor.push(component);
            if let Ok(meta) = fs::symlink_metadata(&ancestor) {
                if !meta.is_dir() {
                    fs::remove_file(&ancestor).map_err(|e| io_err(&ancestor, e))?;
                }
            }
        }
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    if let Ok(meta) = fs::symlink_metadata(&target) {
        if meta.is_dir() {
            fs::remove_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else {
            fs::remove_file(&target).map_err(|e| io_err(&target, e))?;
        }
    }
    Ok(())
}

/// Remove empty directories from `path`'s parent upwards, stopping below
/// `root` or at the first non-empty one.
fn prune_empty_parents(root: &Path, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Bring `destination` to the state described by `manifest`.
///
/// An empty plan touches nothing. Otherwise the tree is staged and verified;
/// on a mismatch the bad paths go to the destination's corruption log and
/// [`SyncError::RemoteCorrupt`] is returned with the destination untouched.
pub fn stage_and_swap(
    destination: &Path,
    remote: &Remote,
    manifest: &Manifest,
    plan: &SyncPlan,
    options: &SyncOptions,
) -> Result<(), SyncError> {
    if plan.is_empty() {
        tracing::debug!("{} is up to date", destination.display());
        return Ok(());
    }

    let staging = Staging::create(&options.staging_root())?;
    staging.seed_from(destination);
    staging.apply(remote, manifest, plan, options.parallel)?;

    let mismatched = staging.verify(manifest, &plan.to_transfer)?;
    if !mismatched.is_empty() {
        corruption::record(destination, &mismatched)?;
        return Err(SyncError::RemoteCorrupt { paths: mismatched });
    }

    // The staged tree moves away; dropping `staging` then finds nothing to
    // remove, and any failure leaves the dir for `purge_stale`.
    swap(destination, staging.path())?;
    Ok(())
}
