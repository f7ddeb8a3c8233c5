use crate::metadata::NodeKind;
use async_trait::async_trait;
use std::path::PathBuf;

pub type BackendResult<T> = std::result::Result<T, BackendFailure>;

/// The single failure shape every backend implementation must produce.
///
/// The backends behind this adapter report errors in different forms: bare
/// string codes, structured code-plus-path records, RPC faults that wrap one
/// of the former, or a failure signal with no payload at all. Rather than
/// shape-sniffing inside the translator, the capability boundary admits
/// exactly these four shapes and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendFailure {
    /// Bare string code from backends with a flat error vocabulary.
    Code(String),
    /// Structured failure carrying the backend's code and offending path.
    Coded { code: String, path: Option<PathBuf> },
    /// RPC fault wrapping the remote service's own failure.
    Rpc(Box<BackendFailure>),
    /// Backend signaled failure with no payload.
    Absent,
}

impl BackendFailure {
    pub fn code<S: Into<String>>(code: S) -> Self {
        BackendFailure::Code(code.into())
    }

    pub fn coded<S: Into<String>, P: Into<PathBuf>>(code: S, path: P) -> Self {
        BackendFailure::Coded {
            code: code.into(),
            path: Some(path.into()),
        }
    }

    pub fn rpc(inner: BackendFailure) -> Self {
        BackendFailure::Rpc(Box::new(inner))
    }
}

/// Raw attributes as a backend reports them, before the adapter shapes them
/// into [`crate::NodeMetadata`].
///
/// `size` is `None` when the backend does not track a size for the node
/// (directories on most of ours); the adapter synthesizes the logical
/// directory size in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendAttrs {
    pub kind: NodeKind,
    pub size: Option<u64>,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub birthtime: i64,
}

impl BackendAttrs {
    pub fn new(kind: NodeKind, size: Option<u64>, now: i64) -> Self {
        Self {
            kind,
            size,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }
}

/// Opaque token for an open node.
///
/// Stateful backends assign their own token at create/open time; stateless
/// backends address every call by key, so the key itself is the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandleToken {
    Remote(u64),
    Key(String),
}

/// Per-backend feature flags, queryable by the adapter and by callers.
///
/// Support for an operation is declared here rather than inferred from
/// stubbed-out methods; the adapter reports `NotSupported` without issuing a
/// backend call when the flag is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// symlink / read_symlink are implemented.
    pub symlinks: bool,
    /// set_times is implemented.
    pub times: bool,
    /// The backend buffers writes. When false, fsync is a correct no-op.
    pub buffering: bool,
}

/// The capability interface a storage backend exposes to the adapter.
///
/// All keys are in normalized backend form (see [`crate::path::backend_key`]):
/// the leading separator is stripped and the root is the empty string. Every
/// method suspends at most once per remote call and reports failure as a
/// [`BackendFailure`], never a panic.
#[async_trait]
pub trait Backend: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    async fn probe(&self, key: &str) -> BackendResult<BackendAttrs>;

    async fn create(&self, key: &str) -> BackendResult<HandleToken>;
    async fn remove(&self, key: &str) -> BackendResult<()>;

    async fn make_directory(&self, key: &str) -> BackendResult<()>;
    async fn remove_directory(&self, key: &str) -> BackendResult<()>;
    async fn list(&self, key: &str) -> BackendResult<Vec<String>>;

    async fn rename(&self, old_key: &str, new_key: &str) -> BackendResult<()>;

    async fn read(&self, token: &HandleToken, offset: u64, length: u64) -> BackendResult<Vec<u8>>;
    async fn write(&self, token: &HandleToken, data: &[u8], offset: u64) -> BackendResult<u64>;
    async fn truncate(&self, key: &str, length: u64) -> BackendResult<()>;

    async fn set_times(&self, key: &str, atime: i64, mtime: i64) -> BackendResult<()>;

    async fn symlink(&self, key: &str, target: &str) -> BackendResult<()>;
    async fn read_symlink(&self, key: &str) -> BackendResult<String>;
}
