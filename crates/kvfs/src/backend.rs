// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Filesystem backend over a flat key-value store.
//!
//! The store holds file payloads only, one value per file, addressed by
//! the sentinel-encoded key (see [`crate::keys`]). The hierarchy itself —
//! which keys exist, which are directories, attributes — lives in a
//! [`DirectoryIndex`] kept beside the store. Every payload access goes
//! through the [`TransactionManager`], so concurrent operations on the
//! same file serialize rather than interleave.

use crate::error::StoreError;
use crate::keys;
use crate::store::KeyValueStore;
use crate::txn::TransactionManager;
use async_trait::async_trait;
use bridgefs::backend::{
    Backend, BackendAttrs, BackendFailure, BackendResult, Capabilities, HandleToken,
};
use bridgefs::metadata::NodeKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;

/// Tracks which backend keys exist and what kind of node each is.
///
/// The store cannot answer "what are the children of this directory"
/// without a full scan, so the hierarchy is maintained here. `rename`
/// moves a whole subtree and reports the file keys it moved, so the
/// caller can relocate their payloads in the store.
#[async_trait]
pub trait DirectoryIndex: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<BackendAttrs>, StoreError>;
    async fn upsert(&self, key: &str, attrs: BackendAttrs) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn children(&self, key: &str) -> Result<Vec<String>, StoreError>;
    /// Move `old_key` and everything under it. Returns `(old, new)` backend
    /// key pairs for the moved files, in index order.
    async fn rename(&self, old_key: &str, new_key: &str)
    -> Result<Vec<(String, String)>, StoreError>;
}

/// Index backed by an ordered in-memory map; the root directory always
/// exists.
#[derive(Clone)]
pub struct MemoryIndex {
    entries: Arc<AsyncMutex<BTreeMap<String, BackendAttrs>>>,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            String::new(),
            BackendAttrs::new(NodeKind::Directory, None, 0),
        );
        Self {
            entries: Arc::new(AsyncMutex::new(entries)),
        }
    }
}

fn is_under(prefix: &str, key: &str) -> bool {
    if prefix.is_empty() {
        return !key.is_empty();
    }
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl DirectoryIndex for MemoryIndex {
    async fn lookup(&self, key: &str) -> Result<Option<BackendAttrs>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, attrs: BackendAttrs) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), attrs);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn children(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().await;
        let mut names = Vec::new();
        for child in entries.keys() {
            if is_under(key, child) {
                let rest = if key.is_empty() {
                    child.as_str()
                } else {
                    &child[key.len() + 1..]
                };
                // Direct children only.
                if !rest.contains('/') {
                    names.push(rest.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn rename(
        &self,
        old_key: &str,
        new_key: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let mut entries = self.entries.lock().await;
        let affected: Vec<String> = entries
            .keys()
            .filter(|k| k.as_str() == old_key || is_under(old_key, k))
            .cloned()
            .collect();
        let mut moved_files = Vec::new();
        for old in affected {
            if let Some(attrs) = entries.remove(&old) {
                let new = format!("{}{}", new_key, &old[old_key.len()..]);
                if attrs.kind == NodeKind::File {
                    moved_files.push((old, new.clone()));
                }
                entries.insert(new, attrs);
            }
        }
        Ok(moved_files)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn absent(key: &str) -> BackendFailure {
    BackendFailure::coded("ENOENT", format!("/{}", key))
}

fn coded(code: &str, key: &str) -> BackendFailure {
    BackendFailure::coded(code, format!("/{}", key))
}

fn parent_of(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

/// [`Backend`] over a [`KeyValueStore`] plus [`DirectoryIndex`].
#[derive(Clone)]
pub struct KvBackend {
    index: Arc<dyn DirectoryIndex>,
    txns: TransactionManager,
}

impl KvBackend {
    pub fn new(store: Arc<dyn KeyValueStore>, index: Arc<dyn DirectoryIndex>) -> Self {
        Self {
            index,
            txns: TransactionManager::new(store),
        }
    }

    /// A backend over fresh in-memory store and index, for tests.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(crate::memory::MemoryStore::new()),
            Arc::new(MemoryIndex::new()),
        )
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.txns
    }

    async fn lookup(&self, key: &str) -> BackendResult<Option<BackendAttrs>> {
        self.index
            .lookup(key)
            .await
            .map_err(StoreError::into_failure)
    }

    async fn require(&self, key: &str) -> BackendResult<BackendAttrs> {
        self.lookup(key).await?.ok_or_else(|| absent(key))
    }

    async fn require_parent_dir(&self, key: &str) -> BackendResult<()> {
        let parent = parent_of(key);
        match self.require(parent).await? {
            attrs if attrs.kind == NodeKind::Directory => Ok(()),
            _ => Err(coded("ENOTDIR", parent)),
        }
    }

    async fn upsert(&self, key: &str, attrs: BackendAttrs) -> BackendResult<()> {
        self.index
            .upsert(key, attrs)
            .await
            .map_err(StoreError::into_failure)
    }

    /// Read the whole payload under the key's lock; a file with no stored
    /// value reads as empty.
    async fn load(&self, key: &str) -> Vec<u8> {
        let txn = self.txns.begin_read_only(&keys::encode(key)).await;
        let value = txn.get().await.unwrap_or_default();
        txn.commit().await;
        value
    }

    /// Replace the whole payload and refresh the index entry's size and
    /// mtime.
    async fn save(&self, key: &str, mut attrs: BackendAttrs, data: Vec<u8>) -> BackendResult<()> {
        let txn = self.txns.begin_read_write(&keys::encode(key)).await;
        let accepted = txn.put(&data).await;
        txn.commit().await;
        if !accepted {
            return Err(coded("EIO", key));
        }
        attrs.size = Some(data.len() as u64);
        attrs.mtime = now_millis();
        self.upsert(key, attrs).await
    }

    fn key_of<'a>(&self, token: &'a HandleToken) -> BackendResult<&'a str> {
        match token {
            HandleToken::Key(key) => Ok(key),
            HandleToken::Remote(_) => Err(BackendFailure::code("EBADF")),
        }
    }
}

#[async_trait]
impl Backend for KvBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            symlinks: false,
            times: true,
            buffering: false,
        }
    }

    async fn probe(&self, key: &str) -> BackendResult<BackendAttrs> {
        self.require(key).await
    }

    async fn create(&self, key: &str) -> BackendResult<HandleToken> {
        self.require_parent_dir(key).await?;
        if self.lookup(key).await?.is_some() {
            return Err(coded("EEXIST", key));
        }
        let txn = self.txns.begin_read_write(&keys::encode(key)).await;
        let accepted = txn.put(&[]).await;
        txn.commit().await;
        if !accepted {
            return Err(coded("EIO", key));
        }
        self.upsert(key, BackendAttrs::new(NodeKind::File, Some(0), now_millis()))
            .await?;
        Ok(HandleToken::Key(key.to_string()))
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        let attrs = self.require(key).await?;
        if attrs.kind == NodeKind::Directory {
            return Err(coded("EISDIR", key));
        }
        let txn = self.txns.begin_read_write(&keys::encode(key)).await;
        txn.delete().await;
        txn.commit().await;
        self.index
            .remove(key)
            .await
            .map_err(StoreError::into_failure)
    }

    async fn make_directory(&self, key: &str) -> BackendResult<()> {
        self.require_parent_dir(key).await?;
        if self.lookup(key).await?.is_some() {
            return Err(coded("EEXIST", key));
        }
        self.upsert(
            key,
            BackendAttrs::new(NodeKind::Directory, None, now_millis()),
        )
        .await
    }

    async fn remove_directory(&self, key: &str) -> BackendResult<()> {
        if key.is_empty() {
            return Err(coded("EBUSY", key));
        }
        let attrs = self.require(key).await?;
        if attrs.kind != NodeKind::Directory {
            return Err(coded("ENOTDIR", key));
        }
        let children = self
            .index
            .children(key)
            .await
            .map_err(StoreError::into_failure)?;
        if !children.is_empty() {
            return Err(coded("ENOTEMPTY", key));
        }
        self.index
            .remove(key)
            .await
            .map_err(StoreError::into_failure)
    }

    async fn list(&self, key: &str) -> BackendResult<Vec<String>> {
        let attrs = self.require(key).await?;
        if attrs.kind != NodeKind::Directory {
            return Err(coded("ENOTDIR", key));
        }
        self.index
            .children(key)
            .await
            .map_err(StoreError::into_failure)
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> BackendResult<()> {
        self.require(old_key).await?;
        // The root cannot move, and a node cannot move under itself.
        if old_key.is_empty() || is_under(old_key, new_key) {
            return Err(coded("EINVAL", new_key));
        }
        self.require_parent_dir(new_key).await?;
        if self.lookup(new_key).await?.is_some() {
            return Err(coded("EEXIST", new_key));
        }
        let moved = self
            .index
            .rename(old_key, new_key)
            .await
            .map_err(StoreError::into_failure)?;
        // Relocate payloads one file at a time, holding both keys' locks
        // for the duration of each move. The pair is acquired in sorted
        // key order so crossing renames cannot deadlock on each other.
        for (old, new) in moved {
            let old_store = keys::encode(&old);
            let new_store = keys::encode(&new);
            let old_first = old_store <= new_store;
            let (first_key, second_key) = if old_first {
                (&old_store, &new_store)
            } else {
                (&new_store, &old_store)
            };
            let first = self.txns.begin_read_write(first_key).await;
            let second = self.txns.begin_read_write(second_key).await;
            let (from, to) = if old_first {
                (&first, &second)
            } else {
                (&second, &first)
            };
            if let Some(value) = from.get().await {
                if !to.put(&value).await {
                    return Err(coded("EIO", &new));
                }
            }
            from.delete().await;
            first.commit().await;
            second.commit().await;
        }
        Ok(())
    }

    async fn read(&self, token: &HandleToken, offset: u64, length: u64) -> BackendResult<Vec<u8>> {
        let key = self.key_of(token)?;
        let attrs = self.require(key).await?;
        if attrs.kind != NodeKind::File {
            return Err(coded("EISDIR", key));
        }
        let value = self.load(key).await;
        let start = (offset as usize).min(value.len());
        let end = start.saturating_add(length as usize).min(value.len());
        Ok(value[start..end].to_vec())
    }

    async fn write(&self, token: &HandleToken, data: &[u8], offset: u64) -> BackendResult<u64> {
        let key = self.key_of(token)?;
        let attrs = self.require(key).await?;
        if attrs.kind != NodeKind::File {
            return Err(coded("EISDIR", key));
        }
        let mut value = self.load(key).await;
        let offset = offset as usize;
        if value.len() < offset {
            value.resize(offset, 0);
        }
        let end = offset + data.len();
        if value.len() < end {
            value.resize(end, 0);
        }
        value[offset..end].copy_from_slice(data);
        self.save(key, attrs, value).await?;
        Ok(data.len() as u64)
    }

    async fn truncate(&self, key: &str, length: u64) -> BackendResult<()> {
        let attrs = self.require(key).await?;
        if attrs.kind != NodeKind::File {
            return Err(coded("EISDIR", key));
        }
        let mut value = self.load(key).await;
        value.resize(length as usize, 0);
        self.save(key, attrs, value).await
    }

    async fn set_times(&self, key: &str, atime: i64, mtime: i64) -> BackendResult<()> {
        let mut attrs = self.require(key).await?;
        attrs.atime = atime;
        attrs.mtime = mtime;
        self.upsert(key, attrs).await
    }

    async fn symlink(&self, key: &str, _target: &str) -> BackendResult<()> {
        Err(coded("ENOSYS", key))
    }

    async fn read_symlink(&self, key: &str) -> BackendResult<String> {
        Err(coded("ENOSYS", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_under() {
        assert!(is_under("", "a"));
        assert!(is_under("a", "a/b"));
        assert!(is_under("a", "a/b/c"));
        assert!(!is_under("", ""));
        assert!(!is_under("a", "a"));
        assert!(!is_under("a", "ab"));
        assert!(!is_under("a/b", "a"));
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("a"), "");
        assert_eq!(parent_of("a/b"), "a");
        assert_eq!(parent_of("a/b/c"), "a/b");
    }
}
