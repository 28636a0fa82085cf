//! [`SyncEngine`]: the upload and download flows.

use std::fmt;
use std::fs;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::Arc;
use std::time::SystemTime;

use metasync_core::digest::fingerprint_tree;
use metasync_core::manifest::read_local;
use metasync_core::{
    diff_for_download, diff_for_upload, FileMap, Manifest, SyncOptions, SyncPlan, META_FILE,
};
use metasync_transport::{
    Access, DefaultStoreFactory, Location, Remote, RemoteSpec, RetryPolicy, StoreFactory,
    TransportError, UploadSettings,
};

use crate::corruption;
use crate::error::{io_err, SyncError};
use crate::pool::run_parallel;
use crate::staging::{self, check_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// What one sync did. Paths are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: Direction,
    pub transferred: Vec<String>,
    pub deleted: Vec<String>,
}

impl SyncReport {
    fn from_plan(direction: Direction, plan: &SyncPlan) -> Self {
        Self {
            direction,
            transferred: plan.to_transfer.iter().cloned().collect(),
            deleted: plan.to_delete.iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transferred.is_empty() && self.deleted.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.direction {
            Direction::Upload => "Uploading",
            Direction::Download => "Downloading",
        };
        write!(
            f,
            "{verb}: {} Deleting: {}",
            self.transferred.len(),
            self.deleted.len()
        )
    }
}

/// Runs syncs with one set of options against stores from one factory.
pub struct SyncEngine {
    options: SyncOptions,
    factory: Arc<dyn StoreFactory>,
}

impl SyncEngine {
    /// Engine backed by real S3 / HTTP stores.
    pub fn new(options: SyncOptions) -> Self {
        let factory = Arc::new(DefaultStoreFactory::new(options.clone()));
        Self { options, factory }
    }

    pub fn with_factory(options: SyncOptions, factory: Arc<dyn StoreFactory>) -> Self {
        Self { options, factory }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync `source` into `destination`.
    ///
    /// Exactly one side must be remote (`bucket:prefix` or a URL); it picks
    /// the direction. Arguments are validated before any network or
    /// filesystem activity.
    pub fn sync(&self, source: &str, destination: &str) -> Result<SyncReport, SyncError> {
        check_argument("source", source)?;
        check_argument("destination", destination)?;
        self.options.validate()?;

        let source = parse_location(source)?;
        let destination = parse_location(destination)?;

        match (source, destination) {
            (Location::Local(dir), Location::Remote(spec)) => self.upload(&dir, &spec),
            (Location::Remote(spec), Location::Local(dir)) => self.download(&spec, &dir),
            (Location::Local(_), Location::Local(_)) => Err(SyncError::InvalidArguments(
                "source and destination are both local; one side must be remote".to_string(),
            )),
            (Location::Remote(_), Location::Remote(_)) => Err(SyncError::InvalidArguments(
                "source and destination are both remote; one side must be local".to_string(),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    fn upload(&self, dir: &Path, spec: &RemoteSpec) -> Result<SyncReport, SyncError> {
        if !dir.is_dir() {
            return Err(SyncError::InvalidArguments(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        let remote = self.remote(spec, Access::Write)?;

        let force = corruption::take(dir)?;
        let existing = match remote.try_fetch_manifest() {
            Ok(found) => found,
            Err(TransportError::Manifest(err)) => {
                tracing::warn!(
                    "ignoring unreadable manifest at {}: {err}",
                    remote.location(META_FILE)
                );
                None
            }
            Err(err) => return Err(err.into()),
        };
        if existing.is_none() {
            tracing::warn!(
                "no manifest at {}; uploading everything",
                remote.location(META_FILE)
            );
        }
        let remote_manifest = existing.clone().unwrap_or_default();

        let local = Manifest::new(fingerprint_tree(dir, None)?, self.options.zip);
        let plan = diff_for_upload(&local, &remote_manifest, &force);
        let report = SyncReport::from_plan(Direction::Upload, &plan);
        tracing::debug!("{report}");

        let compressed = local.compressed;
        run_parallel(
            report.transferred.clone(),
            self.options.parallel,
            |rel: String| {
                let path = dir.join(&rel);
                let body = fs::read(&path).map_err(|e| io_err(&path, e))?;
                remote.upload(&rel, &body, compressed)?;
                tracing::debug!("uploaded {}", remote.location(&rel));
                Ok(())
            },
        )?;

        if !report.deleted.is_empty() {
            remote.delete(&report.deleted)?;
        }

        if plan.is_empty() && existing.as_ref() == Some(&local) {
            tracing::debug!("remote manifest already current");
        } else {
            remote.store_manifest(&local)?;
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Download
    // -----------------------------------------------------------------------

    fn download(&self, spec: &RemoteSpec, dir: &Path) -> Result<SyncReport, SyncError> {
        let remote = self.remote(spec, Access::Read)?;
        staging::purge_stale(&self.options.staging_root(), SystemTime::now());

        let manifest = match remote.fetch_manifest() {
            Ok(manifest) => manifest,
            Err(err) if err.is_not_found() => {
                return Err(SyncError::RemoteWithoutMeta {
                    location: remote.location(META_FILE),
                })
            }
            Err(err) => return Err(err.into()),
        };
        for rel in manifest.files.keys() {
            check_path(rel)?;
        }

        let local = self.local_manifest(dir, &manifest)?;
        let plan = diff_for_download(&manifest, local.as_ref());
        let report = SyncReport::from_plan(Direction::Download, &plan);
        tracing::debug!("{report}");

        staging::stage_and_swap(dir, &remote, &manifest, &plan, &self.options)?;
        Ok(report)
    }

    /// What the destination currently holds, or `None` when it does not
    /// exist yet.
    fn local_manifest(&self, dir: &Path, remote: &Manifest) -> Result<Option<Manifest>, SyncError> {
        if self.options.no_local_changes {
            if let Some(cached) = read_local(dir)? {
                return Ok(Some(cached));
            }
            tracing::debug!("no cached manifest in {}; hashing", dir.display());
        }
        if !dir.is_dir() {
            return Ok(None);
        }
        let files: FileMap = fingerprint_tree(dir, None)?;
        Ok(Some(Manifest::new(files, remote.compressed)))
    }

    fn remote(&self, spec: &RemoteSpec, access: Access) -> Result<Remote, SyncError> {
        let store = self.factory.open(spec, access)?;
        let retry = RetryPolicy::new(self.options.max_retries, self.options.retry_backoff());
        Ok(Remote::new(store, spec.prefix(), retry)
            .with_upload_settings(UploadSettings::from_options(&self.options)))
    }
}

fn check_argument(name: &str, value: &str) -> Result<(), SyncError> {
    if value.is_empty() {
        return Err(SyncError::InvalidArguments(format!("{name} is empty")));
    }
    if value.ends_with('/') || value.ends_with(MAIN_SEPARATOR) {
        return Err(SyncError::InvalidArguments(format!(
            "{name} {value:?} must not end with a path separator"
        )));
    }
    Ok(())
}

fn parse_location(value: &str) -> Result<Location, SyncError> {
    Location::parse(value).map_err(|err| SyncError::InvalidArguments(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasync_transport::{MemoryStore, MemoryStoreFactory};
    use tempfile::TempDir;

    fn engine() -> (SyncEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let factory = Arc::new(MemoryStoreFactory::new(store.clone()));
        (SyncEngine::with_factory(SyncOptions::default(), factory), store)
    }

    #[test]
    fn trailing_separators_are_rejected() {
        let (engine, store) = engine();
        for (src, dst) in [("local/", "bucket:site"), ("local", "bucket:site/")] {
            let err = engine.sync(src, dst).unwrap_err();
            assert!(matches!(err, SyncError::InvalidArguments(_)), "{err}");
        }
        assert!(store.keys().is_empty());
    }

    #[test]
    fn two_locals_or_two_remotes_are_rejected() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.sync("a", "b").unwrap_err(),
            SyncError::InvalidArguments(_)
        ));
        assert!(matches!(
            engine.sync("bucket:a", "https://example.com/b").unwrap_err(),
            SyncError::InvalidArguments(_)
        ));
    }

    #[test]
    fn zero_parallelism_fails_before_touching_the_store() {
        let store = Arc::new(MemoryStore::new());
        let options = SyncOptions {
            parallel: 0,
            ..SyncOptions::default()
        };
        let engine =
            SyncEngine::with_factory(options, Arc::new(MemoryStoreFactory::new(store.clone())));
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().to_str().unwrap();

        assert!(matches!(
            engine.sync(src, "bucket:site").unwrap_err(),
            SyncError::Config(_)
        ));
        assert_eq!(store.put_count(), 0);
    }

    #[test]
    fn upload_from_missing_directory_is_rejected() {
        let (engine, store) = engine();
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = engine
            .sync(missing.to_str().unwrap(), "bucket:site")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidArguments(_)));
        assert_eq!(store.put_count(), 0);
    }

    #[test]
    fn report_summary_wording() {
        let plan = SyncPlan {
            to_transfer: ["a".to_string(), "b".to_string()].into(),
            to_delete: ["c".to_string()].into(),
        };
        assert_eq!(
            SyncReport::from_plan(Direction::Upload, &plan).to_string(),
            "Uploading: 2 Deleting: 1"
        );
        assert_eq!(
            SyncReport::from_plan(Direction::Download, &SyncPlan::default()).to_string(),
            "Downloading: 0 Deleting: 0"
        );
    }

    #[test]
    fn unsafe_manifest_paths_abort_download() {
        let (engine, store) = engine();
        store.insert("site/.s3-meta-sync", "files:\n  ../escape: 0cc175b9c0f1b6a831c399e269772661\n");
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("dest");

        let err = engine
            .sync("bucket:site", dest.to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsafePath { .. }), "{err}");
        assert!(!dest.exists());
    }
}
