//! The configuration record accepted by the sync engine.
//!
//! Every field has a default, so a YAML file only needs the keys it
//! overrides:
//!
//! ```yaml
//! parallel: 20
//! zip: true
//! acl: private
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Access keys for signed object-store requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Worker threads per transfer phase (capped by the number of items).
    pub parallel: usize,
    pub open_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Overrides both per-class retry defaults (SSL: 1, network/HTTP: 2).
    pub max_retries: Option<u32>,
    /// Base delay between retries; doubled on every further attempt.
    pub retry_backoff_ms: u64,
    pub ssl_verify: bool,
    /// Gzip file bodies in the store.
    pub zip: bool,
    /// Trust the local manifest instead of re-hashing the destination tree.
    pub no_local_changes: bool,
    pub acl: String,
    pub server_side_encryption: Option<String>,
    pub region: Option<String>,
    /// S3-compatible endpoint, e.g. `http://localhost:9000`.
    pub endpoint: Option<String>,
    /// Where staging directories are created; the OS temp dir if unset.
    pub staging_root: Option<PathBuf>,
    pub credentials: Option<Credentials>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            parallel: 10,
            open_timeout_secs: 5,
            read_timeout_secs: 10,
            max_retries: None,
            retry_backoff_ms: 200,
            ssl_verify: true,
            zip: false,
            no_local_changes: false,
            acl: "public-read".to_string(),
            server_side_encryption: None,
            region: None,
            endpoint: None,
            staging_root: None,
            credentials: None,
        }
    }
}

impl SyncOptions {
    /// Load options from a YAML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let options: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel == 0 {
            return Err(ConfigError::Invalid {
                field: "parallel",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.acl.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "acl",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
