//! [`Remote`]: a synced folder inside an [`ObjectStore`].

use std::path::Path;
use std::sync::Arc;

use metasync_core::{Manifest, SyncOptions, META_FILE};

use crate::codec;
use crate::error::{ErrorClass, TransportError};
use crate::http::{HttpSettings, HttpStore};
use crate::location::RemoteSpec;
use crate::retry::RetryPolicy;
use crate::s3::{S3Config, S3Store};
use crate::store::{Access, ObjectStore, PutOptions, StoreFactory, MAX_DELETE_BATCH};

/// Attributes applied to every uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSettings {
    pub acl: Option<String>,
    pub server_side_encryption: Option<String>,
}

impl UploadSettings {
    pub fn from_options(options: &SyncOptions) -> Self {
        Self {
            acl: Some(options.acl.clone()),
            server_side_encryption: options.server_side_encryption.clone(),
        }
    }
}

/// Relative paths in, object keys out. Every call is retried per policy.
#[derive(Clone)]
pub struct Remote {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    retry: RetryPolicy,
    upload: UploadSettings,
}

impl Remote {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str, retry: RetryPolicy) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            retry,
            upload: UploadSettings::default(),
        }
    }

    pub fn with_upload_settings(mut self, upload: UploadSettings) -> Self {
        self.upload = upload;
        self
    }

    /// Object key for a relative path.
    pub fn key(&self, rel: &str) -> String {
        if self.prefix.is_empty() {
            rel.to_string()
        } else {
            format!("{}/{rel}", self.prefix)
        }
    }

    pub fn location(&self, rel: &str) -> String {
        self.store.describe(&self.key(rel))
    }

    /// Raw bytes at `rel`.
    pub fn get(&self, rel: &str) -> Result<Vec<u8>, TransportError> {
        let key = self.key(rel);
        self.retry
            .run(&self.store.describe(&key), || self.store.get_object(&key))
    }

    /// File body at `rel`, gunzipped when the tree is stored compressed.
    pub fn download(&self, rel: &str, compressed: bool) -> Result<Vec<u8>, TransportError> {
        let body = self.get(rel)?;
        if !compressed {
            return Ok(body);
        }
        codec::decompress_bytes(&body).map_err(|source| TransportError::Codec {
            location: self.location(rel),
            source,
        })
    }

    /// Store a file body, gzipping it first when `compressed`.
    pub fn upload(&self, rel: &str, body: &[u8], compressed: bool) -> Result<(), TransportError> {
        let mut options = PutOptions {
            acl: self.upload.acl.clone(),
            content_type: Some(content_type_for(rel).to_string()),
            content_encoding: None,
            server_side_encryption: self.upload.server_side_encryption.clone(),
        };

        let packed;
        let body = if compressed {
            packed = codec::compress(body).map_err(|source| TransportError::Codec {
                location: self.location(rel),
                source,
            })?;
            options.content_encoding = Some("gzip".to_string());
            packed.as_slice()
        } else {
            body
        };

        let key = self.key(rel);
        self.retry.run(&self.store.describe(&key), || {
            self.store.put_object(&key, body, &options)
        })
    }

    /// Delete `rels`, at most [`MAX_DELETE_BATCH`] keys per request.
    pub fn delete(&self, rels: &[String]) -> Result<(), TransportError> {
        for chunk in rels.chunks(MAX_DELETE_BATCH) {
            let keys: Vec<String> = chunk.iter().map(|rel| self.key(rel)).collect();
            tracing::debug!("deleting batch of {} keys", keys.len());
            self.retry
                .run(&self.store.describe(&self.prefix), || {
                    self.store.delete_objects(&keys)
                })?;
        }
        Ok(())
    }

    /// Relative paths of every object under the prefix.
    pub fn list(&self) -> Result<Vec<String>, TransportError> {
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };
        let keys = self
            .retry
            .run(&self.store.describe(&prefix), || self.store.list_objects(&prefix))?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Fetch and decode the remote manifest.
    ///
    /// A missing manifest is retried like a network error, since a publisher
    /// may be mid-write; `NotFound` surfaces once the budget is spent.
    pub fn fetch_manifest(&self) -> Result<Manifest, TransportError> {
        let key = self.key(META_FILE);
        let body = self.retry.run_classified(
            &self.store.describe(&key),
            |err| match err.class() {
                ErrorClass::NotFound => ErrorClass::Network,
                other => other,
            },
            || self.store.get_object(&key).map_err(manifest_absent),
        )?;
        Ok(Manifest::decode(&body)?)
    }

    /// Fetch the remote manifest if there is one, without waiting out the
    /// retry budget on a missing object.
    pub fn try_fetch_manifest(&self) -> Result<Option<Manifest>, TransportError> {
        let key = self.key(META_FILE);
        match self.retry.run(&self.store.describe(&key), || {
            self.store.get_object(&key).map_err(manifest_absent)
        }) {
            Ok(body) => Ok(Some(Manifest::decode(&body)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Store the manifest, never compressed.
    pub fn store_manifest(&self, manifest: &Manifest) -> Result<(), TransportError> {
        let body = manifest.encode()?;
        let key = self.key(META_FILE);
        let options = PutOptions {
            acl: self.upload.acl.clone(),
            content_type: Some("text/yaml".to_string()),
            content_encoding: None,
            server_side_encryption: self.upload.server_side_encryption.clone(),
        };
        self.retry.run(&self.store.describe(&key), || {
            self.store.put_object(&key, &body, &options)
        })
    }
}

/// S3 answers a GET for a missing key with 403 when the caller may not list
/// the bucket (anonymous reads included), so on the manifest key a 403 is an
/// absent manifest.
fn manifest_absent(err: TransportError) -> TransportError {
    match err {
        TransportError::Status {
            location,
            status: 403,
        } => TransportError::NotFound { location },
        other => other,
    }
}

/// MIME type from a path's extension.
pub fn content_type_for(rel: &str) -> &'static str {
    let ext = Path::new(rel)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("yml" | "yaml") => "text/yaml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "tgz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("wasm") => "application/wasm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Builds [`S3Store`]s and [`HttpStore`]s from [`SyncOptions`].
#[derive(Debug, Clone)]
pub struct DefaultStoreFactory {
    options: SyncOptions,
}

impl DefaultStoreFactory {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            open_timeout: self.options.open_timeout(),
            read_timeout: self.options.read_timeout(),
            ssl_verify: self.options.ssl_verify,
        }
    }
}

impl StoreFactory for DefaultStoreFactory {
    fn open(
        &self,
        spec: &RemoteSpec,
        access: Access,
    ) -> Result<Arc<dyn ObjectStore>, TransportError> {
        match spec {
            RemoteSpec::Url { base } => {
                if access == Access::Write {
                    return Err(TransportError::ReadOnly {
                        location: base.clone(),
                    });
                }
                Ok(Arc::new(HttpStore::new(base, &self.http_settings())?))
            }
            RemoteSpec::Bucket { bucket, .. } => {
                if access == Access::Write && self.options.credentials.is_none() {
                    return Err(TransportError::MissingCredentials {
                        location: spec.to_string(),
                    });
                }
                let config = S3Config {
                    region: self.options.region.clone(),
                    endpoint: self.options.endpoint.clone(),
                    credentials: self.options.credentials.clone(),
                    http: self.http_settings(),
                };
                Ok(Arc::new(S3Store::new(bucket, &config)?))
            }
        }
    }
}
