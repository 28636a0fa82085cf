//! # metasync-sync
//!
//! Manifest-driven one-way sync between a local directory and a remote
//! folder.
//!
//! Call [`SyncEngine::sync`] with a source and a destination; whichever one
//! names a remote decides the direction. Downloads are assembled in a
//! staging directory, verified against the remote manifest and only then
//! swapped into place.

pub mod corruption;
pub mod engine;
pub mod error;
pub mod pool;
pub mod staging;
pub mod swap;

pub use engine::{Direction, SyncEngine, SyncReport};
pub use error::SyncError;
