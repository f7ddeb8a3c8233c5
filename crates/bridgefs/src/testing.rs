//! Instrumented backend wrappers for tests.
//!
//! [`RecordingBackend`] captures the exact sequence of backend calls an
//! operation issued, so tests can assert ordering and no-mutation
//! guarantees. [`FaultInjector`] injects backend failures: the
//! probe/truncate race the open resolver must survive, or a hard probe
//! fault that must surface immediately.

use crate::backend::{
    Backend, BackendAttrs, BackendFailure, BackendResult, Capabilities, HandleToken,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Backend wrapper that records every call in order.
pub struct RecordingBackend<B: Backend> {
    inner: B,
    calls: Arc<Mutex<Vec<String>>>,
}

const MUTATING: &[&str] = &[
    "create",
    "remove",
    "make_directory",
    "remove_directory",
    "rename",
    "write",
    "truncate",
    "set_times",
    "symlink",
];

impl<B: Backend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Every backend call so far, in issue order, as `"op key"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Count of calls that mutate backend state.
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                MUTATING
                    .iter()
                    .any(|op| call.split(' ').next() == Some(*op))
            })
            .count()
    }
}

#[async_trait]
impl<B: Backend> Backend for RecordingBackend<B> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn probe(&self, key: &str) -> BackendResult<BackendAttrs> {
        self.record(format!("probe {}", key));
        self.inner.probe(key).await
    }

    async fn create(&self, key: &str) -> BackendResult<HandleToken> {
        self.record(format!("create {}", key));
        self.inner.create(key).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.record(format!("remove {}", key));
        self.inner.remove(key).await
    }

    async fn make_directory(&self, key: &str) -> BackendResult<()> {
        self.record(format!("make_directory {}", key));
        self.inner.make_directory(key).await
    }

    async fn remove_directory(&self, key: &str) -> BackendResult<()> {
        self.record(format!("remove_directory {}", key));
        self.inner.remove_directory(key).await
    }

    async fn list(&self, key: &str) -> BackendResult<Vec<String>> {
        self.record(format!("list {}", key));
        self.inner.list(key).await
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> BackendResult<()> {
        self.record(format!("rename {} {}", old_key, new_key));
        self.inner.rename(old_key, new_key).await
    }

    async fn read(&self, token: &HandleToken, offset: u64, length: u64) -> BackendResult<Vec<u8>> {
        self.record(format!("read {:?}", token));
        self.inner.read(token, offset, length).await
    }

    async fn write(&self, token: &HandleToken, data: &[u8], offset: u64) -> BackendResult<u64> {
        self.record(format!("write {:?}", token));
        self.inner.write(token, data, offset).await
    }

    async fn truncate(&self, key: &str, length: u64) -> BackendResult<()> {
        self.record(format!("truncate {}", key));
        self.inner.truncate(key, length).await
    }

    async fn set_times(&self, key: &str, atime: i64, mtime: i64) -> BackendResult<()> {
        self.record(format!("set_times {}", key));
        self.inner.set_times(key, atime, mtime).await
    }

    async fn symlink(&self, key: &str, target: &str) -> BackendResult<()> {
        self.record(format!("symlink {}", key));
        self.inner.symlink(key, target).await
    }

    async fn read_symlink(&self, key: &str) -> BackendResult<String> {
        self.record(format!("read_symlink {}", key));
        self.inner.read_symlink(key).await
    }
}

/// Backend wrapper that injects failures.
///
/// `vanishing_truncate` reports `ENOENT` from the next `n` truncate calls
/// and actually removes the node, reproducing the probe-sees-it,
/// truncate-misses-it race; a re-entered open then resolves as
/// create-on-absence. `persistent_truncate` keeps the node and keeps
/// flapping, which is how tests pin down the single-retry bound.
/// `failing_probe` makes every probe report the given failure.
pub struct FaultInjector<B: Backend> {
    inner: B,
    truncate_races: AtomicU32,
    vanish: bool,
    probe_fault: Option<BackendFailure>,
}

impl<B: Backend> FaultInjector<B> {
    pub fn vanishing_truncate(inner: B, races: u32) -> Self {
        Self {
            inner,
            truncate_races: AtomicU32::new(races),
            vanish: true,
            probe_fault: None,
        }
    }

    pub fn persistent_truncate(inner: B, races: u32) -> Self {
        Self {
            inner,
            truncate_races: AtomicU32::new(races),
            vanish: false,
            probe_fault: None,
        }
    }

    pub fn failing_probe(inner: B, fault: BackendFailure) -> Self {
        Self {
            inner,
            truncate_races: AtomicU32::new(0),
            vanish: false,
            probe_fault: Some(fault),
        }
    }
}

#[async_trait]
impl<B: Backend> Backend for FaultInjector<B> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn probe(&self, key: &str) -> BackendResult<BackendAttrs> {
        if let Some(fault) = &self.probe_fault {
            return Err(fault.clone());
        }
        self.inner.probe(key).await
    }

    async fn create(&self, key: &str) -> BackendResult<HandleToken> {
        self.inner.create(key).await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        self.inner.remove(key).await
    }

    async fn make_directory(&self, key: &str) -> BackendResult<()> {
        self.inner.make_directory(key).await
    }

    async fn remove_directory(&self, key: &str) -> BackendResult<()> {
        self.inner.remove_directory(key).await
    }

    async fn list(&self, key: &str) -> BackendResult<Vec<String>> {
        self.inner.list(key).await
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> BackendResult<()> {
        self.inner.rename(old_key, new_key).await
    }

    async fn read(&self, token: &HandleToken, offset: u64, length: u64) -> BackendResult<Vec<u8>> {
        self.inner.read(token, offset, length).await
    }

    async fn write(&self, token: &HandleToken, data: &[u8], offset: u64) -> BackendResult<u64> {
        self.inner.write(token, data, offset).await
    }

    async fn truncate(&self, key: &str, length: u64) -> BackendResult<()> {
        let races = self.truncate_races.load(Ordering::SeqCst);
        if races > 0
            && self
                .truncate_races
                .compare_exchange(races, races - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            if self.vanish {
                // Concurrent removal between the caller's probe and this call.
                let _ = self.inner.remove(key).await;
            }
            return Err(BackendFailure::coded("ENOENT", format!("/{}", key)));
        }
        self.inner.truncate(key, length).await
    }

    async fn set_times(&self, key: &str, atime: i64, mtime: i64) -> BackendResult<()> {
        self.inner.set_times(key, atime, mtime).await
    }

    async fn symlink(&self, key: &str, target: &str) -> BackendResult<()> {
        self.inner.symlink(key, target).await
    }

    async fn read_symlink(&self, key: &str) -> BackendResult<String> {
        self.inner.read_symlink(key).await
    }
}
