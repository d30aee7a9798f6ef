//! Durable key-value surface used for the queue and the local counter view.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// String key-value persistence.
///
/// Each call is independent; callers that read-modify-write a key are
/// responsible for serialising those passes.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Read a value, `None` when the key was never written or was removed
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Insert or replace a value
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete a key; removing a missing key succeeds
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Process-local store, handy for tests and guest sessions that never persist.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        Ok(f(&mut guard))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}
