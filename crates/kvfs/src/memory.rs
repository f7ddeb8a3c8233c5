//! In-memory [`KeyValueStore`] implementations for tests and local use.

use crate::error::StoreError;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex as AsyncMutex;

/// A store backed by a shared map. Clones share the same map, which lets a
/// test hand one copy to a backend and keep another for inspection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<AsyncMutex<HashMap<String, Vec<u8>>>>,
    reject_uploads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `upload` always reports `false`, for exercising the
    /// checked-put path.
    pub fn rejecting_uploads() -> Self {
        Self {
            values: Arc::new(AsyncMutex::new(HashMap::new())),
            reject_uploads: true,
        }
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.lock().await.contains_key(key))
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.values
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Remote {
                code: "NOT_FOUND".to_string(),
            })
    }

    async fn upload(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        if self.reject_uploads {
            return Ok(false);
        }
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Wraps a store and records every call as an `"op key"` line, so tests
/// can assert on ordering across tasks.
pub struct RecordingStore<S> {
    inner: S,
    calls: Arc<StdMutex<Vec<String>>>,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn record(&self, line: String) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(line);
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for RecordingStore<S> {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.record(format!("exists {}", key));
        self.inner.exists(key).await
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.record(format!("download {}", key));
        self.inner.download(key).await
    }

    async fn upload(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        self.record(format!(
            "upload {}={}",
            key,
            String::from_utf8_lossy(value)
        ));
        self.inner.upload(key, value).await
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.record(format!("delete {}", key));
        self.inner.delete_key(key).await
    }
}
