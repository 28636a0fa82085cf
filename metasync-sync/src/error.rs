//! Error types for metasync-sync.

use std::path::PathBuf;

use thiserror::Error;

use metasync_core::{ConfigError, ManifestError};
use metasync_transport::TransportError;

/// All errors that can arise from a sync invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote has no manifest; downloading would empty the destination.
    #[error("no manifest found at {location}; refusing to download from a remote without one")]
    RemoteWithoutMeta { location: String },

    /// Downloaded files did not hash to the remote manifest's values.
    #[error("{} downloaded file(s) do not match the remote manifest: {}", .paths.len(), .paths.join(", "))]
    RemoteCorrupt { paths: Vec<String> },

    /// Rejected before any network or filesystem activity.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A manifest path that would escape the synced directory.
    #[error("refusing unsafe path from manifest: {path}")]
    UnsafePath { path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a transfer worker panicked")]
    WorkerPanicked,
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
