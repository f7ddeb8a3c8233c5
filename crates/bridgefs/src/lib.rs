//! bridgefs: a POSIX-style filesystem adapter over non-hierarchical backends.
//!
//! Remote blob services and key-value stores expose per-call, asynchronous
//! operations with their own error vocabularies and no transactions. This
//! crate bridges that to a caller expecting filesystem verbs, ordered
//! visibility, and POSIX-style errors:
//!
//! - [`Error`] is the closed taxonomy every backend failure normalizes onto.
//! - [`OpenPolicy`] and the open resolver turn an open call into exactly one
//!   backend action, with a single bounded retry for the truncate race.
//! - [`path::backend_key`] rewrites absolute paths for backends that reject
//!   a leading separator.
//! - [`FileSystem`] is the adapter facade composing the above over any
//!   [`Backend`].
//!
//! The key-value-backed variant, with its per-key transaction manager,
//! lives in the `kvfs` crate.

pub mod backend;
pub mod error;
pub mod fs;
pub mod memory;
pub mod metadata;
pub mod open;
pub mod path;
pub mod testing;

pub use backend::{
    Backend, BackendAttrs, BackendFailure, BackendResult, Capabilities, HandleToken,
};
pub use error::{Error, Result};
pub use fs::FileSystem;
pub use memory::MemoryBackend;
pub use metadata::{DIRECTORY_SIZE, NodeKind, NodeMetadata};
pub use open::{AccessMode, FileHandle, OpenPolicy, WhenExists, WhenNotExists};

#[cfg(test)]
mod tests;
