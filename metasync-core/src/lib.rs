//! metasync core library: manifest model, content digests, diffing, options.
//!
//! Public API surface:
//! - [`types`] - [`Fingerprint`] and the path→fingerprint map
//! - [`manifest`] - [`Manifest`] codec and the local `.s3-meta-sync` file
//! - [`digest`] - MD5 fingerprints for single files and whole trees
//! - [`diff`] - upload / download [`SyncPlan`]s
//! - [`config`] - [`SyncOptions`], the configuration record
//! - [`error`] - [`ManifestError`], [`ConfigError`]

pub mod config;
pub mod diff;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::{Credentials, SyncOptions};
pub use diff::{diff_for_download, diff_for_upload, SyncPlan};
pub use error::{ConfigError, ManifestError};
pub use manifest::{Manifest, CORRUPT_LOG, META_FILE};
pub use types::{FileMap, Fingerprint};
