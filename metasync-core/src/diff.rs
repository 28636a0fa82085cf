//! Diff engine: which paths to transfer and which to delete.
//!
//! Pure set/map comparisons over [`FileMap`]s. Results are `BTreeSet`s so
//! every enumeration (logging, dispatch order) is sorted by path.

use std::collections::BTreeSet;

use crate::manifest::Manifest;
use crate::types::FileMap;

/// Work derived from comparing two manifests. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_transfer: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_transfer.is_empty() && self.to_delete.is_empty()
    }
}

/// Plan an upload of `local` over `remote`.
///
/// Transfers every local path whose fingerprint differs from the remote one,
/// plus every local path named in `force`. If the two compression flags
/// differ, every local path is transferred. Deletes remote paths that are
/// absent locally.
pub fn diff_for_upload(local: &Manifest, remote: &Manifest, force: &BTreeSet<String>) -> SyncPlan {
    let to_transfer = if local.compressed != remote.compressed {
        local.files.keys().cloned().collect()
    } else {
        let mut changed = changed_paths(&local.files, &remote.files);
        changed.extend(
            force
                .iter()
                .filter(|path| local.files.contains_key(*path))
                .cloned(),
        );
        changed
    };

    SyncPlan {
        to_transfer,
        to_delete: missing_paths(&remote.files, &local.files),
    }
}

/// Plan a download of `remote` into a tree described by `local`.
///
/// With no local manifest every remote path is downloaded.
pub fn diff_for_download(remote: &Manifest, local: Option<&Manifest>) -> SyncPlan {
    let Some(local) = local else {
        return SyncPlan {
            to_transfer: remote.files.keys().cloned().collect(),
            to_delete: BTreeSet::new(),
        };
    };

    SyncPlan {
        to_transfer: changed_paths(&remote.files, &local.files),
        to_delete: missing_paths(&local.files, &remote.files),
    }
}

/// Paths in `source` whose fingerprint in `destination` differs or is absent.
fn changed_paths(source: &FileMap, destination: &FileMap) -> BTreeSet<String> {
    source
        .iter()
        .filter(|(path, hash)| destination.get(*path) != Some(*hash))
        .map(|(path, _)| path.clone())
        .collect()
}

/// Paths in `destination` that `source` does not have.
fn missing_paths(destination: &FileMap, source: &FileMap) -> BTreeSet<String> {
    destination
        .keys()
        .filter(|path| !source.contains_key(*path))
        .cloned()
        .collect()
}
