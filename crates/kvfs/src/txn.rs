// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Keyed transactions over a non-transactional remote store.
//!
//! The store offers only independent `exists`/`download`/`upload`/`delete`
//! calls. This module serializes them per logical key: one active
//! transaction (read or write) per key at a time, acquired by waiting
//! asynchronously on a per-key lock, never by polling. That is a
//! conservative policy — read-read concurrency is traded away for the
//! certainty that no read observes a half-applied write.
//!
//! A transaction's lifecycle is `created → active → committed | aborted`.
//! `begin_*` returns only once the lock is held, so a returned transaction
//! is active; `commit` and `abort` consume it, so a finished transaction
//! cannot be reused. Dropping a transaction releases the lock like `abort`.
//!
//! Operations are applied to the store immediately; the lock serializes,
//! it does not buffer. `abort` is therefore not a rollback: writes made
//! before the abort stay visible. Callers that need true rollback must
//! buffer above this layer.

use crate::error::StoreError;
use crate::store::KeyValueStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct LockSlot {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
}

/// Refcounted per-key lock registry.
///
/// A slot exists only while some transaction holds or awaits its key; the
/// last release removes the slot, so the table does not grow with the
/// number of keys ever locked.
struct LockTable {
    slots: StdMutex<HashMap<String, LockSlot>>,
}

impl LockTable {
    fn new() -> Self {
        Self {
            slots: StdMutex::new(HashMap::new()),
        }
    }

    async fn acquire(self: &Arc<Self>, key: &str) -> KeyLock {
        let lock = {
            // Poisoning only marks that a holder panicked; the map itself
            // stays consistent, so recover rather than propagate.
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            let slot = slots.entry(key.to_string()).or_insert_with(|| LockSlot {
                lock: Arc::new(AsyncMutex::new(())),
                holders: 0,
            });
            slot.holders += 1;
            slot.lock.clone()
        };
        // Suspend here until every earlier transaction on this key is done.
        let guard = lock.lock_owned().await;
        KeyLock {
            table: self.clone(),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    fn release(&self, key: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get_mut(key) {
            slot.holders -= 1;
            if slot.holders == 0 {
                slots.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Holds a key's lock; releasing drops the registry refcount.
struct KeyLock {
    table: Arc<LockTable>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // Release the mutex before the slot refcount so a waiter never
        // finds its slot already removed.
        self.guard.take();
        self.table.release(&self.key);
    }
}

/// Hands out single-key transactions over a shared store.
#[derive(Clone)]
pub struct TransactionManager {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<LockTable>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Arc::new(LockTable::new()),
        }
    }

    /// Begin a read-only transaction on `key`; waits for any active
    /// transaction on the same key.
    pub async fn begin_read_only(&self, key: &str) -> ReadTransaction {
        let lock = self.locks.acquire(key).await;
        ReadTransaction {
            inner: TxnInner {
                store: self.store.clone(),
                key: key.to_string(),
                _lock: lock,
            },
        }
    }

    /// Begin a read-write transaction on `key`; waits for any active
    /// transaction on the same key.
    pub async fn begin_read_write(&self, key: &str) -> WriteTransaction {
        diagnostics::log_debug!("txn begin rw {key}", key: key);
        let lock = self.locks.acquire(key).await;
        WriteTransaction {
            inner: TxnInner {
                store: self.store.clone(),
                key: key.to_string(),
                _lock: lock,
            },
        }
    }

    /// Number of keys currently in the lock registry.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}

struct TxnInner {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _lock: KeyLock,
}

impl TxnInner {
    /// Absence and failure both fold into `None`: a read of an unknown key
    /// is a normal case in a sparse store, not an error.
    async fn get(&self) -> Option<Vec<u8>> {
        match self.store.exists(&self.key).await {
            Ok(true) => match self.store.download(&self.key).await {
                Ok(value) => Some(value),
                Err(err) => {
                    warn_swallowed("download", &self.key, &err);
                    None
                }
            },
            Ok(false) => None,
            Err(err) => {
                warn_swallowed("exists", &self.key, &err);
                None
            }
        }
    }

    /// Commit defers the lock release by one scheduling turn so an
    /// operation issued just before commit is not starved of the lock it
    /// still runs under.
    async fn commit(self) {
        tokio::task::yield_now().await;
    }
}

fn warn_swallowed(op: &str, key: &str, err: &StoreError) {
    let detail = err.to_string();
    diagnostics::log_warn!("store {op} on {key} failed: {detail}", op: op, key: key, detail: detail);
}

/// Single-key transaction that only reads.
pub struct ReadTransaction {
    inner: TxnInner,
}

impl ReadTransaction {
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub async fn get(&self) -> Option<Vec<u8>> {
        self.inner.get().await
    }

    pub async fn commit(self) {
        self.inner.commit().await;
    }

    /// Releases the lock with no backend call.
    pub fn abort(self) {}
}

/// Single-key transaction that may read, put, and delete.
pub struct WriteTransaction {
    inner: TxnInner,
}

impl WriteTransaction {
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub async fn get(&self) -> Option<Vec<u8>> {
        self.inner.get().await
    }

    /// Upload a value; returns whether the store accepted it. A `false`
    /// outcome is a value for the caller to check, not an error.
    pub async fn put(&self, value: &[u8]) -> bool {
        match self.inner.store.upload(&self.inner.key, value).await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn_swallowed("upload", &self.inner.key, &err);
                false
            }
        }
    }

    /// Best-effort delete. Removing an absent key is not an error in this
    /// model, so failures are swallowed.
    pub async fn delete(&self) {
        if let Err(err) = self.inner.store.delete_key(&self.inner.key).await {
            warn_swallowed("delete", &self.inner.key, &err);
        }
    }

    pub async fn commit(self) {
        self.inner.commit().await;
    }

    /// Releases the lock with no backend call.
    ///
    /// Not a rollback: operations already applied in this transaction stay
    /// visible (see the module docs).
    pub fn abort(self) {}
}
