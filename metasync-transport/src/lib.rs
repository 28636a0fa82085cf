//! # metasync-transport
//!
//! Fetch / store / delete / list bytes at logical paths of a remote folder.
//!
//! A remote is either `bucket:prefix` (an S3 bucket reached through
//! `aws-sdk-s3`) or a plain `http(s)://` mirror that is
//! read-only. [`Remote`] layers key prefixing, bounded retries, gzip and
//! delete batching over whichever [`ObjectStore`] backs it.

pub mod codec;
pub mod error;
pub mod http;
pub mod location;
pub mod memory;
pub mod remote;
pub mod retry;
pub mod s3;
pub mod store;

pub use error::{ErrorClass, TransportError};
pub use http::{HttpSettings, HttpStore};
pub use location::{Location, RemoteSpec};
pub use memory::{MemoryStore, MemoryStoreFactory, StoredObject};
pub use remote::{content_type_for, DefaultStoreFactory, Remote, UploadSettings};
pub use retry::RetryPolicy;
pub use s3::{S3Config, S3Store};
pub use store::{Access, ObjectStore, PutOptions, StoreFactory, MAX_DELETE_BATCH};
