//! Error types for metasync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from manifest decoding, local manifest persistence, and hashing.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Payload is not a mapping of either the structured or the legacy shape.
    #[error("manifest is corrupt: {source}")]
    Corrupt {
        #[source]
        source: serde_yaml::Error,
    },

    /// A well-shaped payload whose value for `path` is not an MD5 digest.
    #[error("manifest is corrupt: fingerprint `{fingerprint}` for `{path}` is not an MD5 digest")]
    BadFingerprint { path: String, fingerprint: String },

    /// YAML serialization error (encode path).
    #[error("manifest serialization error: {0}")]
    Encode(#[from] serde_yaml::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading or validating [`crate::SyncOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid option `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience constructor for [`ManifestError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}
