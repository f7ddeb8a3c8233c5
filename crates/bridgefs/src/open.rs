// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Open-policy resolution: decide the single backend action for an open call.

use crate::backend::{Backend, HandleToken};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// What to do when the path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExists {
    Fail,
    Truncate,
    OpenExisting,
}

/// What to do when the path does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenNotExists {
    CreateNew,
    Fail,
}

/// Caller intent for a single open call. Immutable for that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPolicy {
    pub when_exists: WhenExists,
    pub when_not_exists: WhenNotExists,
}

impl OpenPolicy {
    /// Open an existing node; fail if it is missing.
    pub const OPEN_EXISTING: Self = Self {
        when_exists: WhenExists::OpenExisting,
        when_not_exists: WhenNotExists::Fail,
    };

    /// Create the node; fail if it already exists.
    pub const CREATE_NEW: Self = Self {
        when_exists: WhenExists::Fail,
        when_not_exists: WhenNotExists::CreateNew,
    };

    /// Truncate an existing node or create a fresh one.
    pub const TRUNCATE_OR_CREATE: Self = Self {
        when_exists: WhenExists::Truncate,
        when_not_exists: WhenNotExists::CreateNew,
    };

    /// Open an existing node or create a fresh one.
    pub const OPEN_OR_CREATE: Self = Self {
        when_exists: WhenExists::OpenExisting,
        when_not_exists: WhenNotExists::CreateNew,
    };
}

/// Access mode a handle was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(&self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// An open node: the backend's token, the path it was opened at, and the
/// mode it was opened with.
///
/// Owned by the caller between open and close; the adapter never retains
/// one. The path is kept for error context only; the token is what
/// addresses the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    token: HandleToken,
    path: PathBuf,
    mode: AccessMode,
}

impl FileHandle {
    pub fn new<P: AsRef<Path>>(token: HandleToken, path: P, mode: AccessMode) -> Self {
        Self {
            token,
            path: path.as_ref().to_path_buf(),
            mode,
        }
    }

    pub fn token(&self) -> &HandleToken {
        &self.token
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

/// Resolve an open call into exactly one backend action.
///
/// The order is fixed: probe first, then act on the policy. The common
/// open-existing case costs a single round trip. If a truncate races with a
/// concurrent removal (the probe saw the node, the truncate reports it
/// gone), the algorithm re-enters at the probe exactly once; a second
/// disappearance surfaces as the error it is. That single re-entry bounds
/// worst-case latency against a flapping backend.
pub(crate) async fn resolve_open(
    backend: &dyn Backend,
    path: &Path,
    key: &str,
    policy: OpenPolicy,
    mode: AccessMode,
) -> Result<FileHandle> {
    let mut reentered = false;
    loop {
        let probe = backend.probe(key).await;
        match probe {
            Ok(_attrs) => match policy.when_exists {
                WhenExists::Fail => return Err(Error::already_exists(path)),
                WhenExists::OpenExisting => {
                    // Attach to the node as-is, no further backend calls.
                    return Ok(FileHandle::new(HandleToken::Key(key.to_string()), path, mode));
                }
                WhenExists::Truncate => match backend.truncate(key, 0).await {
                    Ok(()) => {
                        return Ok(FileHandle::new(HandleToken::Key(key.to_string()), path, mode));
                    }
                    Err(failure) => {
                        let err = Error::from_backend(failure, path);
                        if matches!(err, Error::NotFound(_)) && !reentered {
                            diagnostics::log_debug!(
                                "open: node vanished between probe and truncate, re-entering once"
                            );
                            reentered = true;
                            continue;
                        }
                        return Err(err);
                    }
                },
            },
            Err(failure) => {
                let err = Error::from_backend(failure, path);
                if !matches!(err, Error::NotFound(_)) {
                    // Probe failures other than absence surface immediately.
                    return Err(err);
                }
                match policy.when_not_exists {
                    WhenNotExists::Fail => return Err(Error::not_found(path)),
                    WhenNotExists::CreateNew => {
                        return match backend.create(key).await {
                            Ok(token) => Ok(FileHandle::new(token, path, mode)),
                            Err(failure) => Err(Error::from_backend(failure, path)),
                        };
                    }
                }
            }
        }
    }
}
