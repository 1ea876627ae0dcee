//! In-memory credential store for tests and fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::credentials::CredentialKey;
use crate::error::StorageError;
use crate::ports::CredentialStore;

/// Credential store backed by a map behind a lock.
///
/// `put_many` is atomic under the map lock, so readers never observe a
/// partial logical update. Read/write faults can be injected to exercise
/// failure paths.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<CredentialKey, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given entries.
    pub fn with_entries(entries: &[(CredentialKey, &str)]) -> Self {
        let store = Self::new();
        {
            let mut map = store.entries.lock();
            for (key, value) in entries {
                map.insert(*key, (*value).to_string());
            }
        }
        store
    }

    /// Make every read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write (and delete) fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the current contents, for assertions.
    pub fn snapshot(&self) -> HashMap<CredentialKey, String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed("injected read fault".to_string()));
        }
        Ok(self.entries.lock().get(&key).cloned())
    }

    async fn put(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("injected write fault".to_string()));
        }
        self.entries.lock().insert(key, value.to_string());
        Ok(())
    }

    async fn delete(&self, key: CredentialKey) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("injected write fault".to_string()));
        }
        self.entries.lock().remove(&key);
        Ok(())
    }

    async fn put_many(&self, entries: &[(CredentialKey, String)]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("injected write fault".to_string()));
        }
        // One lock span: the whole logical update lands at once.
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert(*key, value.clone());
        }
        Ok(())
    }
}
