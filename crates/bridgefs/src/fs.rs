// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::backend::{Backend, Capabilities, HandleToken};
use crate::error::{Error, Result};
use crate::metadata::NodeMetadata;
use crate::open::{AccessMode, FileHandle, OpenPolicy, resolve_open};
use crate::path::{backend_key, is_root};
use std::path::Path;
use std::sync::Arc;

/// POSIX-style filesystem facade over a single backend.
///
/// Every operation follows the same shape: normalize the path into backend
/// key form, issue the backend call, wrap the raw result into the typed
/// caller-facing value, and on failure translate through the error taxonomy
/// with the operation's path attached. The facade holds no per-node state;
/// cloning it shares the backend.
#[derive(Clone)]
pub struct FileSystem {
    backend: Arc<dyn Backend>,
}

impl FileSystem {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        FileSystem {
            backend: Arc::new(backend),
        }
    }

    pub fn with_shared(backend: Arc<dyn Backend>) -> Self {
        FileSystem { backend }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Node metadata for `path`.
    ///
    /// The root never reaches the backend: its metadata is synthesized
    /// locally and is always a directory, so backends need no root concept.
    pub async fn stat<P: AsRef<Path>>(&self, path: P) -> Result<NodeMetadata> {
        let path = path.as_ref();
        if is_root(path) {
            return Ok(NodeMetadata::root());
        }
        let key = backend_key(path)?;
        match self.backend.probe(&key).await {
            Ok(attrs) => Ok(NodeMetadata::from_attrs(attrs)),
            Err(failure) => Err(Error::from_backend(failure, path)),
        }
    }

    /// Probe folded into a boolean; errors other than absence still surface.
    pub async fn exists<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open `path` under the caller's policy. See [`OpenPolicy`].
    pub async fn open<P: AsRef<Path>>(
        &self,
        path: P,
        policy: OpenPolicy,
        mode: AccessMode,
    ) -> Result<FileHandle> {
        let path = path.as_ref();
        if is_root(path) {
            return Err(Error::is_a_directory(path));
        }
        let key = backend_key(path)?;
        let display = path.display().to_string();
        diagnostics::log_debug!("open {path}", path: display);
        resolve_open(self.backend.as_ref(), path, &key, policy, mode).await
    }

    /// Create a new empty file; fails if the path exists.
    pub async fn create_file<P: AsRef<Path>>(&self, path: P) -> Result<FileHandle> {
        self.open(path, OpenPolicy::CREATE_NEW, AccessMode::ReadWrite)
            .await
    }

    pub async fn unlink<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let key = backend_key(path)?;
        self.backend
            .remove(&key)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn mkdir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if is_root(path) {
            return Err(Error::already_exists(path));
        }
        let key = backend_key(path)?;
        self.backend
            .make_directory(&key)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn rmdir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let key = backend_key(path)?;
        self.backend
            .remove_directory(&key)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    /// Names of the entries in a directory.
    pub async fn readdir<P: AsRef<Path>>(&self, path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        let key = backend_key(path)?;
        self.backend
            .list(&key)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q) -> Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();
        if is_root(from) {
            return Err(Error::io(from, "cannot rename the root directory"));
        }
        if is_root(to) {
            return Err(Error::already_exists(to));
        }
        let from_key = backend_key(from)?;
        let to_key = backend_key(to)?;
        let from_display = from.display().to_string();
        let to_display = to.display().to_string();
        diagnostics::log_info!("rename {from} -> {to}", from: from_display, to: to_display);
        self.backend
            .rename(&from_key, &to_key)
            .await
            .map_err(|f| Error::from_backend(f, from))
    }

    /// Read up to `length` bytes at `offset` through an open handle.
    pub async fn read(&self, handle: &FileHandle, offset: u64, length: u64) -> Result<Vec<u8>> {
        if !handle.mode().readable() {
            return Err(Error::io(handle.path(), "handle not open for reading"));
        }
        self.backend
            .read(handle.token(), offset, length)
            .await
            .map_err(|f| Error::from_backend(f, handle.path()))
    }

    /// Write bytes at `offset` through an open handle; returns bytes written.
    pub async fn write(&self, handle: &FileHandle, data: &[u8], offset: u64) -> Result<u64> {
        if !handle.mode().writable() {
            return Err(Error::io(handle.path(), "handle not open for writing"));
        }
        self.backend
            .write(handle.token(), data, offset)
            .await
            .map_err(|f| Error::from_backend(f, handle.path()))
    }

    pub async fn truncate<P: AsRef<Path>>(&self, path: P, length: u64) -> Result<()> {
        let path = path.as_ref();
        let key = backend_key(path)?;
        self.backend
            .truncate(&key, length)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn utimes<P: AsRef<Path>>(&self, path: P, atime: i64, mtime: i64) -> Result<()> {
        let path = path.as_ref();
        if !self.backend.capabilities().times {
            return Err(Error::not_supported(path, "utimes"));
        }
        let key = backend_key(path)?;
        self.backend
            .set_times(&key, atime, mtime)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn symlink<P: AsRef<Path>>(&self, path: P, target: &str) -> Result<()> {
        let path = path.as_ref();
        if !self.backend.capabilities().symlinks {
            return Err(Error::not_supported(path, "symlink"));
        }
        let key = backend_key(path)?;
        self.backend
            .symlink(&key, target)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    pub async fn readlink<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        if !self.backend.capabilities().symlinks {
            return Err(Error::not_supported(path, "readlink"));
        }
        let key = backend_key(path)?;
        self.backend
            .read_symlink(&key)
            .await
            .map_err(|f| Error::from_backend(f, path))
    }

    /// Flush buffered writes for `path`.
    ///
    /// Against a backend that reports no buffering this is a true no-op,
    /// not a `NotSupported`: there is nothing to flush, so succeeding is
    /// the correct answer.
    pub async fn fsync<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if self.backend.capabilities().buffering {
            return Err(Error::not_supported(path, "fsync"));
        }
        Ok(())
    }

    /// Whole-file read convenience: open existing, read to end.
    pub async fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let md = self.stat(path).await?;
        if md.is_dir() {
            return Err(Error::is_a_directory(path));
        }
        let handle = self
            .open(path, OpenPolicy::OPEN_EXISTING, AccessMode::Read)
            .await?;
        self.read(&handle, 0, md.size).await
    }

    /// Whole-file write convenience: truncate-or-create, then one write.
    pub async fn write_file<P: AsRef<Path>>(&self, path: P, data: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let handle = self
            .open(path, OpenPolicy::TRUNCATE_OR_CREATE, AccessMode::Write)
            .await?;
        self.write(&handle, data, 0).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileSystem{{}}")
    }
}

// Handle tokens of removed or renamed nodes are the caller's problem, the
// same as a POSIX fd to an unlinked file; the facade never retains one.
#[allow(dead_code)]
fn _assert_traits() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FileSystem>();
    assert_send_sync::<FileHandle>();
    assert_send_sync::<HandleToken>();
}
