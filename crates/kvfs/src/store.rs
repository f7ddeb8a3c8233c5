use crate::error::StoreError;
use async_trait::async_trait;

/// The raw remote key-value store: independent per-call operations with no
/// isolation guarantee of any kind.
///
/// `upload` reports acceptance as a boolean: a `false` is a signaled
/// failure value the caller must check, not an exception. Serialization of
/// concurrent access is layered on top by
/// [`crate::txn::TransactionManager`], never assumed here.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    async fn upload(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;
    async fn delete_key(&self, key: &str) -> Result<(), StoreError>;
}
