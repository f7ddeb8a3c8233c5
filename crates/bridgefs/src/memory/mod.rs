//! In-memory backend: the reference implementation of [`crate::Backend`].
//!
//! Used as the test fixture throughout the workspace and as a scratch
//! filesystem. Every operation behaves like a remote call that completes
//! immediately; failures are reported in the structured `Coded` shape.

mod backend;

pub use backend::MemoryBackend;
