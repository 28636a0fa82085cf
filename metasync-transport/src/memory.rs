//! In-memory [`ObjectStore`], used as the store double in tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TransportError;
use crate::location::RemoteSpec;
use crate::store::{Access, ObjectStore, PutOptions, StoreFactory, MAX_DELETE_BATCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub options: PutOptions,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    delete_batches: Mutex<Vec<usize>>,
    puts: AtomicUsize,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes, like a plain HTTP mirror.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Seed an object without counting it as a put.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects().insert(
            key.into(),
            StoredObject {
                body: body.into(),
                options: PutOptions::default(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    /// Number of `put_object` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Size of every `delete_objects` call so far, in call order.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryStore {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, TransportError> {
        self.objects()
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| TransportError::NotFound {
                location: self.describe(key),
            })
    }

    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        options: &PutOptions,
    ) -> Result<(), TransportError> {
        if self.read_only {
            return Err(TransportError::ReadOnly {
                location: self.describe(key),
            });
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn delete_objects(&self, keys: &[String]) -> Result<(), TransportError> {
        if self.read_only {
            return Err(TransportError::ReadOnly {
                location: self.describe(""),
            });
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(TransportError::BadResponse {
                location: self.describe(""),
                message: format!("{} keys in one delete request", keys.len()),
            });
        }
        self.delete_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(keys.len());
        let mut objects = self.objects();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, TransportError> {
        Ok(self
            .objects()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn describe(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Hands out the same [`MemoryStore`] for every spec.
///
/// Write access to a URL spec is still refused, mirroring
/// [`crate::DefaultStoreFactory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreFactory {
    pub store: Arc<MemoryStore>,
}

impl MemoryStoreFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open(
        &self,
        spec: &RemoteSpec,
        access: Access,
    ) -> Result<Arc<dyn ObjectStore>, TransportError> {
        if access == Access::Write && spec.is_url() {
            return Err(TransportError::ReadOnly {
                location: spec.to_string(),
            });
        }
        Ok(self.store.clone())
    }
}
