// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Filesystem adapter backend over a flat remote key-value store.
//!
//! The store knows nothing about files: it maps opaque keys to byte
//! values, with no hierarchy, no attributes, and no isolation between
//! calls. This crate supplies the missing pieces:
//!
//! - [`keys`] — reversible encoding between backend keys and store keys,
//! - [`txn`] — per-key transactions serializing concurrent access,
//! - [`backend`] — a [`bridgefs::Backend`] implementation combining the
//!   store with a [`backend::DirectoryIndex`] that tracks the hierarchy.
//!
//! Mount it through the adapter facade:
//!
//! ```ignore
//! let fs = bridgefs::FileSystem::new(KvBackend::in_memory());
//! ```

pub mod backend;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;
pub mod txn;

pub use backend::{DirectoryIndex, KvBackend, MemoryIndex};
pub use error::StoreError;
pub use memory::{MemoryStore, RecordingStore};
pub use store::KeyValueStore;
pub use txn::{ReadTransaction, TransactionManager, WriteTransaction};
