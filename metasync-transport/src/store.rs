//! The object-store seam.

use std::sync::Arc;

use crate::error::TransportError;
use crate::location::RemoteSpec;

/// Object-store protocol limit on keys per delete request.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Per-object upload attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub acl: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub server_side_encryption: Option<String>,
}

/// A flat key → bytes store.
///
/// Implementations make exactly one network call per method; retrying,
/// prefixing and batching are [`crate::Remote`]'s job. Bodies are fully
/// buffered so that a failed read can be retried as a whole.
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, TransportError>;

    fn put_object(&self, key: &str, body: &[u8], options: &PutOptions)
        -> Result<(), TransportError>;

    /// Delete at most [`MAX_DELETE_BATCH`] keys.
    fn delete_objects(&self, keys: &[String]) -> Result<(), TransportError>;

    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, TransportError>;

    /// Human-readable location of `key`, used in errors and logs.
    fn describe(&self, key: &str) -> String;
}

/// What a sync intends to do with a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Builds the store behind a [`RemoteSpec`].
///
/// Opening must not touch the network; it is where configuration problems
/// (writing to a URL, writing without credentials) are rejected.
pub trait StoreFactory: Send + Sync {
    fn open(&self, spec: &RemoteSpec, access: Access)
        -> Result<Arc<dyn ObjectStore>, TransportError>;
}
